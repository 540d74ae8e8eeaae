//! Reduction of per-resource outcomes into a bundle deployment status.

use armada_api::{
    bundledeployment::{BundleDeploymentStatus, ModifiedStatus},
    condition::{self, Condition, ConditionStatus, conditions},
};

use crate::render::ResourceKey;

/// What happened to one rendered resource during an apply pass.
#[derive(Debug)]
pub enum ResourceOutcome {
    /// Created, updated or adopted successfully.
    Applied { key: ResourceKey },

    /// The live resource belongs to someone else, or lost our stamp.
    NotOwnedByUs { key: ResourceKey },

    /// Applied in an earlier pass, deleted since.
    Missing { key: ResourceKey },

    /// The API server rejected the write.
    Failed { key: ResourceKey, message: String },
}

impl ResourceOutcome {
    pub fn key(&self) -> &ResourceKey {
        match self {
            Self::Applied { key }
            | Self::NotOwnedByUs { key }
            | Self::Missing { key }
            | Self::Failed { key, .. } => key,
        }
    }
}

/// Rolls the outcomes into the deployment status.
///
/// The reducer never fails: every combination of outcomes produces a status.
/// Ownership conflicts outrank missing resources, which outrank plain apply
/// errors.
pub fn reduce(status: &mut BundleDeploymentStatus, outcomes: &[ResourceOutcome]) {
    let mut modified = Vec::new();
    let mut failure = None;

    for outcome in outcomes {
        match outcome {
            ResourceOutcome::Applied { .. } => {}
            ResourceOutcome::NotOwnedByUs { key } => modified.push(ModifiedStatus {
                api_version: key.api_version.clone(),
                kind: key.kind.clone(),
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                not_owned: true,
                ..ModifiedStatus::default()
            }),
            ResourceOutcome::Missing { key } => modified.push(ModifiedStatus {
                api_version: key.api_version.clone(),
                kind: key.kind.clone(),
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                missing: true,
                ..ModifiedStatus::default()
            }),
            ResourceOutcome::Failed { key, message } => {
                failure.get_or_insert_with(|| format!("{key}: {message}"));
            }
        }
    }

    let not_owned = modified.iter().find(|entry| entry.not_owned);
    let missing = modified.iter().find(|entry| entry.missing);

    let ready = if let Some(entry) = not_owned {
        Condition::error(conditions::READY, entry.to_string())
    } else if let Some(entry) = missing {
        Condition::error(conditions::READY, entry.to_string())
    } else if let Some(message) = failure {
        Condition::error(conditions::READY, message)
    } else {
        Condition::new(conditions::READY, ConditionStatus::True)
    };

    status.ready = ready.is_true();
    status.non_modified = modified.is_empty();
    status.modified_status = modified;
    condition::set(&mut status.conditions, ready);
}
