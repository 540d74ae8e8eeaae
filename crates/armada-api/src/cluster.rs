//! The `Cluster` and `ClusterGroup` custom resources.
//!
//! A cluster's identity is its `(namespace, name)`; the labels used for
//! partition matching live on its object metadata. Cluster groups gather
//! clusters through a label selector and are themselves matchable by name
//! and labels.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{condition::Condition, summary::Summary};

#[derive(Clone, CustomResource, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "gitops.armada.dev",
    version = "v1alpha1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Halts dispatch of new deployments to this cluster while true.
    #[serde(default)]
    pub paused: bool,

    /// Namespace the downstream agent runs in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_namespace: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub summary: Summary,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "gitops.armada.dev",
    version = "v1alpha1",
    kind = "ClusterGroup",
    namespaced,
    status = "ClusterGroupStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroupSpec {
    /// Selects the member clusters by their labels. Absent means the group
    /// has no members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterGroupStatus {
    #[serde(default)]
    pub cluster_count: i32,

    #[serde(default)]
    pub non_ready_cluster_count: i32,

    #[serde(default)]
    pub summary: Summary,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
