//! Targets: the unit of rollout scheduling.

use armada_api::{
    bundle::Bundle,
    bundledeployment::BundleDeployment,
    cluster::{Cluster, ClusterGroup},
};

/// One (cluster, bundle) pair scheduled for a deployment, plus the cluster's
/// group memberships for partition matching.
///
/// Targets are rebuilt on every reconciliation pass, consumed by the
/// partitioner and discarded together with the pass; they carry no identity
/// of their own.
#[derive(Clone, Debug)]
pub struct Target {
    pub cluster: Cluster,
    pub cluster_groups: Vec<ClusterGroup>,
    pub bundle: Bundle,

    /// The current bundle deployment snapshot, if one has been dispatched.
    pub deployment: Option<BundleDeployment>,

    /// The deployment id this target should converge on.
    pub deployment_id: String,
}

/// A target is up to date once the staged, dispatched and applied deployment
/// ids all equal the desired one.
pub fn is_up_to_date(target: &Target) -> bool {
    let Some(deployment) = &target.deployment else {
        return false;
    };

    deployment.spec.deployment_id == target.deployment_id
        && deployment.spec.staged_deployment_id == target.deployment_id
        && deployment
            .status
            .as_ref()
            .is_some_and(|status| status.applied_deployment_id == target.deployment_id)
}

/// A dispatched deployment is unavailable while its applied id lags behind
/// the dispatched one, or while it reports not ready. Ready on the wrong
/// version is still unavailable.
///
/// An absent deployment is neither available nor unavailable, it is pending
/// first dispatch.
pub fn is_unavailable(deployment: Option<&BundleDeployment>) -> bool {
    let Some(deployment) = deployment else {
        return false;
    };
    let Some(status) = &deployment.status else {
        return true;
    };

    status.applied_deployment_id != deployment.spec.deployment_id || !status.ready
}

/// Counts the unavailable targets of one partition. Fully up-to-date targets
/// are exempt, even when their deployment still reports not ready.
pub fn unavailable(targets: &[&Target]) -> i32 {
    targets
        .iter()
        .filter(|target| !is_up_to_date(target) && is_unavailable(target.deployment.as_ref()))
        .count() as i32
}
