//! The `Bundle` custom resource: a versioned set of rendered resources plus
//! the strategy describing how it is rolled out across clusters.

use k8s_openapi::apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    condition::Condition,
    summary::{PartitionStatus, Summary},
};

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "gitops.armada.dev",
    version = "v1alpha1",
    kind = "Bundle",
    namespaced,
    status = "BundleStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    /// Resources rendered from the source repository, keyed by file name.
    /// The contents are opaque to the controller.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<BundleResource>,

    /// Namespace resources without an explicit namespace are deployed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_strategy: Option<RolloutStrategy>,
}

/// One rendered file of a bundle.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResource {
    pub name: String,

    #[serde(default)]
    pub content: String,

    /// Empty or `base64+gz`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoding: String,
}

/// Controls how a changed bundle is propagated across its targets.
///
/// All budgets accept either an absolute integer or a percent string such as
/// `"25%"`, resolved against the relevant count at evaluation time.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStrategy {
    /// Cap on simultaneously unavailable targets within one partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,

    /// Cap on partitions that may be unavailable at the same time before the
    /// rollout stops advancing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable_partitions: Option<IntOrString>,

    /// Size of automatically computed partitions. An explicit non-positive
    /// integer disables auto partitioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_partition_size: Option<IntOrString>,

    /// Explicit partitions. When set, auto partitioning is skipped and
    /// targets are claimed by the definitions below, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionSpec>,
}

/// One manually declared partition. Populated match fields are ANDed, absent
/// fields are wildcards.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Partition-local unavailability budget, takes precedence over the
    /// strategy-level one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_group_selector: Option<LabelSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_selector: Option<LabelSelector>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleStatus {
    #[serde(default)]
    pub summary: Summary,

    #[serde(default)]
    pub unavailable: i32,

    #[serde(default)]
    pub max_unavailable: i32,

    #[serde(default)]
    pub unavailable_partitions: i32,

    #[serde(default)]
    pub max_unavailable_partitions: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
