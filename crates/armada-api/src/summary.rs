//! Per-state rollups of bundle deployments, used by partition statuses,
//! bundle statuses and metrics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// The states a bundle deployment can be in, as observed by the controller.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, JsonSchema, PartialEq, Serialize)]
pub enum BundleState {
    /// The deployed resources are applied and report ready.
    Ready,
    /// Applied, but at least one resource is not ready yet.
    NotReady,
    /// A new deployment id has been dispatched but not applied yet.
    WaitApplied,
    /// Applying the deployment failed.
    ErrApplied,
    /// The staged deployment id has not been committed yet.
    OutOfSync,
    /// No bundle deployment has been dispatched yet.
    Pending,
    /// The live resources no longer match the bundle's rendered form.
    Modified,
}

impl BundleState {
    pub const ALL: [Self; 7] = [
        Self::Ready,
        Self::NotReady,
        Self::WaitApplied,
        Self::ErrApplied,
        Self::OutOfSync,
        Self::Pending,
        Self::Modified,
    ];

    /// Severity used when folding several states into one; higher wins.
    pub fn rank(self) -> u8 {
        match self {
            Self::ErrApplied => 7,
            Self::WaitApplied => 6,
            Self::Modified => 5,
            Self::OutOfSync => 4,
            Self::Pending => 3,
            Self::NotReady => 2,
            Self::Ready => 1,
        }
    }

    /// The snake_case suffix used for the per-state gauge names.
    pub fn metric_suffix(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NotReady => "not_ready",
            Self::WaitApplied => "wait_applied",
            Self::ErrApplied => "err_applied",
            Self::OutOfSync => "out_of_sync",
            Self::Pending => "pending",
            Self::Modified => "modified",
        }
    }
}

/// Cap on the non-ready resources kept in a [`Summary`], so statuses stay
/// readable for very large fleets.
pub const MAX_NON_READY_RESOURCES: usize = 10;

/// Counts of bundle deployments per state.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub desired_ready: i32,
    #[serde(default)]
    pub ready: i32,
    #[serde(default)]
    pub not_ready: i32,
    #[serde(default)]
    pub wait_applied: i32,
    #[serde(default)]
    pub err_applied: i32,
    #[serde(default)]
    pub out_of_sync: i32,
    #[serde(default)]
    pub pending: i32,
    #[serde(default)]
    pub modified: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_ready_resources: Vec<NonReadyResource>,
}

impl Summary {
    /// Counts one deployment towards its state. Non-ready deployments are
    /// listed by name, up to [`MAX_NON_READY_RESOURCES`].
    pub fn record(&mut self, name: &str, state: BundleState, message: Option<String>) {
        match state {
            BundleState::Ready => self.ready += 1,
            BundleState::NotReady => self.not_ready += 1,
            BundleState::WaitApplied => self.wait_applied += 1,
            BundleState::ErrApplied => self.err_applied += 1,
            BundleState::OutOfSync => self.out_of_sync += 1,
            BundleState::Pending => self.pending += 1,
            BundleState::Modified => self.modified += 1,
        }
        self.desired_ready += 1;

        if state != BundleState::Ready
            && !name.is_empty()
            && self.non_ready_resources.len() < MAX_NON_READY_RESOURCES
        {
            self.non_ready_resources.push(NonReadyResource {
                name: name.to_owned(),
                state,
                message,
            });
        }
    }

    pub fn count(&self, state: BundleState) -> i32 {
        match state {
            BundleState::Ready => self.ready,
            BundleState::NotReady => self.not_ready,
            BundleState::WaitApplied => self.wait_applied,
            BundleState::ErrApplied => self.err_applied,
            BundleState::OutOfSync => self.out_of_sync,
            BundleState::Pending => self.pending,
            BundleState::Modified => self.modified,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.desired_ready == self.ready
    }
}

/// A deployment that keeps the summary from being fully ready.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonReadyResource {
    pub name: String,
    pub state: BundleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Rollout bookkeeping for one partition of targets.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub count: i32,
    #[serde(default)]
    pub max_unavailable: i32,
    #[serde(default)]
    pub unavailable: i32,
    #[serde(default)]
    pub summary: Summary,
}
