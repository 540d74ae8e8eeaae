//! The `BundleDeployment` custom resource: the per-target-cluster instance of
//! a [`Bundle`](crate::bundle::Bundle), reconciled by the agent.

use std::fmt::{self, Display};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Clone, CustomResource, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "gitops.armada.dev",
    version = "v1alpha1",
    kind = "BundleDeployment",
    namespaced,
    status = "BundleDeploymentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BundleDeploymentSpec {
    /// The deployment the agent is expected to apply.
    pub deployment_id: String,

    /// The deployment most recently rendered for this target. Committed into
    /// `deployment_id` once the target's partition is cleared to roll.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub staged_deployment_id: String,

    #[serde(default)]
    pub options: BundleDeploymentOptions,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDeploymentOptions {
    /// Namespace resources without an explicit namespace are deployed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmOptions>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmOptions {
    /// Adopt clean pre-existing resources instead of reporting an ownership
    /// conflict.
    #[serde(default)]
    pub take_ownership: bool,

    /// Overrides the release name derived from the bundle deployment name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDeploymentStatus {
    /// The deployment id last applied to the cluster.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub applied_deployment_id: String,

    #[serde(default)]
    pub ready: bool,

    /// False as soon as any managed resource diverges from the bundle's
    /// rendered form.
    #[serde(default)]
    pub non_modified: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified_status: Vec<ModifiedStatus>,

    /// The resources applied by the last deployment. Consulted on the next
    /// pass to tell adoption candidates apart from resources that lost or
    /// left our ownership.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<BundleDeploymentResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A managed resource whose live state diverges from the bundle.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedStatus {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,

    /// The resource was applied before and has been deleted since.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,

    /// The resource exists but carries another owner's stamp, or none.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not_owned: bool,

    /// The resource exists on the cluster but is not part of the bundle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,

    /// Human-readable description of a content divergence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl Display for ModifiedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}/{}",
            self.api_version, self.kind, self.namespace, self.name
        )?;
        if self.missing {
            write!(f, " missing")
        } else if self.not_owned {
            write!(f, " not owned by us")
        } else if self.delete {
            write!(f, " extra")
        } else if let Some(patch) = &self.patch {
            write!(f, " modified {patch}")
        } else {
            Ok(())
        }
    }
}

/// Identity of one resource applied by a deployment.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDeploymentResource {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}
