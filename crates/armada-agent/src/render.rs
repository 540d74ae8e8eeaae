//! The rendering seam between the agent core and whatever materializes a
//! bundle's content (Helm charts, raw manifests, ...).

use std::fmt::{self, Display};

use armada_api::bundledeployment::{BundleDeployment, BundleDeploymentResource};
use kube::core::DynamicObject;
use snafu::Snafu;

/// Server-side address of one resource.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_owned(),
            kind: kind.to_owned(),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }

    pub fn from_resource(resource: &BundleDeploymentResource) -> Self {
        Self {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            namespace: resource.namespace.clone(),
            name: resource.name.clone(),
        }
    }

    pub fn to_resource(&self) -> BundleDeploymentResource {
        BundleDeploymentResource {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}/{}",
            self.api_version, self.kind, self.namespace, self.name
        )
    }
}

/// One resource rendered from a bundle deployment's content.
#[derive(Clone, Debug)]
pub struct RenderedResource {
    pub key: ResourceKey,
    pub object: DynamicObject,
}

#[derive(Debug, Snafu)]
#[snafu(display("failed to render deployment {deployment_id:?}: {message}"))]
pub struct RenderError {
    pub deployment_id: String,
    pub message: String,
}

/// Materializes the resource set of a bundle deployment.
///
/// Rendering happens entirely in memory; the agent decides afterwards what
/// to do with each resource on the target cluster.
pub trait ResourceProvider {
    fn render(&self, deployment: &BundleDeployment) -> Result<Vec<RenderedResource>, RenderError>;
}
