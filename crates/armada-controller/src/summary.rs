//! Derivation of a bundle deployment's state and per-partition rollups.

use armada_api::{
    bundledeployment::BundleDeployment,
    condition::{self, conditions},
    summary::{BundleState, Summary},
};
use kube::ResourceExt;

use crate::target::Target;

/// Folds one bundle deployment into a single state.
///
/// The ladder checks the apply pipeline back to front: a lagging applied id
/// means the agent has not caught up (or failed), then readiness, then the
/// staged id that has not been committed yet, then content drift.
pub fn deployment_state(deployment: &BundleDeployment) -> BundleState {
    let status = deployment.status.as_ref();
    let applied = status.map_or("", |status| status.applied_deployment_id.as_str());

    if applied != deployment.spec.deployment_id {
        let failed = status
            .is_some_and(|status| condition::is_false(&status.conditions, conditions::DEPLOYED));
        if failed {
            BundleState::ErrApplied
        } else {
            BundleState::WaitApplied
        }
    } else if !status.is_some_and(|status| status.ready) {
        BundleState::NotReady
    } else if deployment.spec.deployment_id != deployment.spec.staged_deployment_id {
        BundleState::OutOfSync
    } else if !status.is_some_and(|status| status.non_modified) {
        BundleState::Modified
    } else {
        BundleState::Ready
    }
}

/// The first error message carried by a deployment's conditions, if any.
pub fn deployment_message(deployment: &BundleDeployment) -> Option<String> {
    let conditions = deployment
        .status
        .as_ref()
        .map_or(&[] as &[_], |status| status.conditions.as_slice());

    [conditions::READY, conditions::DEPLOYED]
        .iter()
        .find_map(|type_| {
            condition::get(conditions, type_)
                .filter(|condition| !condition.is_true())
                .and_then(|condition| condition.message.clone())
        })
}

/// Aggregates the states of all targets in a partition. Targets without a
/// dispatched deployment count as pending.
pub fn summarize(targets: &[&Target]) -> Summary {
    let mut summary = Summary::default();

    for target in targets {
        let cluster = target.cluster.name_any();
        match &target.deployment {
            Some(deployment) => summary.record(
                &cluster,
                deployment_state(deployment),
                deployment_message(deployment),
            ),
            None => summary.record(&cluster, BundleState::Pending, None),
        }
    }

    summary
}
