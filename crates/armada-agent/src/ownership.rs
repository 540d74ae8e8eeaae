//! Classification of live resources against a bundle deployment's claim of
//! ownership.

use std::sync::LazyLock;

use armada_api::{bundledeployment::BundleDeployment, keys};
use kube::{ResourceExt, core::DynamicObject};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::adoption;

/// Stamp values must look like this to be honored; anything else counts as
/// no stamp at all.
static VALID_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._/-]*[A-Za-z0-9])?$")
        .expect("static stamp pattern is always valid")
});

/// The identity a bundle deployment writes onto every resource it manages.
#[derive(Clone, Debug)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub objectset_id: String,
}

impl Release {
    pub fn for_deployment(deployment: &BundleDeployment) -> Self {
        let name = deployment
            .spec
            .options
            .helm
            .as_ref()
            .and_then(|helm| helm.release_name.clone())
            .unwrap_or_else(|| deployment.name_any());
        let namespace = deployment
            .spec
            .options
            .default_namespace
            .clone()
            .unwrap_or_else(|| "default".to_owned());

        Self {
            objectset_id: name.clone(),
            name,
            namespace,
        }
    }

    /// The content hash written into the objectset hash label.
    pub fn objectset_hash(&self) -> String {
        let digest = Sha256::digest(self.objectset_id.as_bytes());
        let mut hash = format!("{digest:x}");
        // wrangler writes sha1-sized hashes, keep the stamp the same width
        hash.truncate(40);
        hash
    }
}

/// The arbiter's verdict for one rendered resource.
#[derive(Debug)]
pub enum Action {
    /// No live counterpart exists, create one.
    Create,

    /// The live resource is ours, replace its content in place.
    Update,

    /// A pre-existing resource may be taken over; carries the merged object
    /// to write.
    Adopt(Box<DynamicObject>),

    /// The live resource belongs to someone else, or lost our stamp.
    NotOwnedByUs,

    /// The resource was applied before and has been deleted since.
    Missing,
}

/// Decides the fate of one rendered resource.
///
/// `previously_applied` says whether the resource was part of the last
/// successfully applied set; it is what tells a fresh adoption candidate
/// apart from a resource that lost our ownership, and a first-time create
/// from a deleted managed resource.
pub fn arbitrate(
    rendered: &DynamicObject,
    live: Option<&DynamicObject>,
    previously_applied: bool,
    release: &Release,
    take_ownership: bool,
) -> Action {
    let Some(live) = live else {
        if previously_applied {
            return Action::Missing;
        }
        return Action::Create;
    };

    if stamped_by_us(live, release) {
        return Action::Update;
    }

    if previously_applied {
        // The object still exists but no longer carries our stamp: the
        // metadata was stripped or another owner took over. Not missing,
        // and no longer ours either.
        return Action::NotOwnedByUs;
    }

    if take_ownership {
        return Action::Adopt(Box::new(adoption::adopt(rendered, live, release)));
    }

    Action::NotOwnedByUs
}

/// A resource counts as ours when its Helm release metadata names our
/// release, or its objectset id annotation matches our id. Garbage stamp
/// values are ignored rather than revered.
fn stamped_by_us(live: &DynamicObject, release: &Release) -> bool {
    let labels = live.labels();
    let annotations = live.annotations();

    let managed_by_helm =
        labels.get(keys::MANAGED_BY_LABEL).map(String::as_str) == Some(keys::MANAGED_BY_HELM);
    let our_release = annotations
        .get(keys::HELM_RELEASE_NAME_ANNOTATION)
        .is_some_and(|name| is_valid_stamp(name) && *name == release.name)
        && annotations
            .get(keys::HELM_RELEASE_NAMESPACE_ANNOTATION)
            .is_some_and(|namespace| *namespace == release.namespace);

    if managed_by_helm && our_release {
        return true;
    }

    annotations
        .get(keys::OBJECTSET_ID_ANNOTATION)
        .is_some_and(|id| is_valid_stamp(id) && *id == release.objectset_id)
}

fn is_valid_stamp(value: &str) -> bool {
    VALID_STAMP.is_match(value)
}
