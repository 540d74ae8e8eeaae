//! Folding a pre-existing live resource into a bundle deployment's managed
//! set.

use armada_api::keys;
use kube::core::DynamicObject;
use serde_json::Value;

use crate::ownership::Release;

/// Produces the object to write when adopting `live`.
///
/// Content keys from the rendered form win on collision, everything else on
/// the live object survives. Prior-owner stamps are dropped from labels and
/// annotations before ours are written; unrelated user metadata stays
/// untouched. Owner references are replaced with the rendered ones.
///
/// Re-merging an already adopted object changes nothing, which keeps the
/// optimistic-concurrency retry loop safe.
pub fn adopt(rendered: &DynamicObject, live: &DynamicObject, release: &Release) -> DynamicObject {
    let mut merged = live.clone();

    merge_values(&mut merged.data, &rendered.data);
    if rendered.types.is_some() {
        merged.types = rendered.types.clone();
    }

    scrub_prior_owner(&mut merged);
    stamp(&mut merged, release);

    merged.metadata.owner_references = rendered.metadata.owner_references.clone();

    merged
}

/// Writes our ownership stamp onto an object before it is created or
/// updated.
pub fn stamp(object: &mut DynamicObject, release: &Release) {
    let labels = object.metadata.labels.get_or_insert_default();
    labels.insert(
        keys::MANAGED_BY_LABEL.to_owned(),
        keys::MANAGED_BY_HELM.to_owned(),
    );
    labels.insert(keys::OBJECTSET_HASH_LABEL.to_owned(), release.objectset_hash());

    let annotations = object.metadata.annotations.get_or_insert_default();
    annotations.insert(
        keys::HELM_RELEASE_NAME_ANNOTATION.to_owned(),
        release.name.clone(),
    );
    annotations.insert(
        keys::HELM_RELEASE_NAMESPACE_ANNOTATION.to_owned(),
        release.namespace.clone(),
    );
    annotations.insert(
        keys::OBJECTSET_ID_ANNOTATION.to_owned(),
        release.objectset_id.clone(),
    );
}

/// Removes every stamp a prior owner may have left behind.
fn scrub_prior_owner(object: &mut DynamicObject) {
    if let Some(labels) = &mut object.metadata.labels {
        labels.retain(|key, _| !key.starts_with(keys::OBJECTSET_KEY_PREFIX));
        labels.remove(keys::MANAGED_BY_LABEL);
    }
    if let Some(annotations) = &mut object.metadata.annotations {
        annotations.retain(|key, _| {
            !key.starts_with(keys::OBJECTSET_KEY_PREFIX) && !key.starts_with(keys::HELM_KEY_PREFIX)
        });
    }
}

/// Recursive merge: maps merge key-wise with `desired` winning on collision,
/// everything else is replaced by `desired`.
fn merge_values(live: &mut Value, desired: &Value) {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => {
            for (key, value) in desired {
                match live.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        live.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (live, desired) => *live = desired.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn release() -> Release {
        Release {
            name: "app".to_owned(),
            namespace: "workloads".to_owned(),
            objectset_id: "app".to_owned(),
        }
    }

    fn object(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).expect("static object is valid")
    }

    fn rendered() -> DynamicObject {
        object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm1", "namespace": "workloads" },
            "data": { "key": "value" },
        }))
    }

    #[test]
    fn content_is_merged_and_desired_wins() {
        let live = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm1", "namespace": "workloads" },
            "data": { "foo": "bar", "key": "stale" },
        }));

        let merged = adopt(&rendered(), &live, &release());

        assert_eq!(
            merged.data["data"],
            json!({ "foo": "bar", "key": "value" })
        );
    }

    #[test]
    fn our_stamps_are_written() {
        let live = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm1", "namespace": "workloads" },
            "data": { "foo": "bar" },
        }));

        let merged = adopt(&rendered(), &live, &release());

        let labels = merged.metadata.labels.as_ref().expect("labels set");
        let annotations = merged.metadata.annotations.as_ref().expect("annotations set");
        assert_eq!(labels.get(keys::MANAGED_BY_LABEL).map(String::as_str), Some("Helm"));
        assert_eq!(
            annotations.get(keys::HELM_RELEASE_NAME_ANNOTATION).map(String::as_str),
            Some("app")
        );
        assert_eq!(
            annotations
                .get(keys::HELM_RELEASE_NAMESPACE_ANNOTATION)
                .map(String::as_str),
            Some("workloads")
        );
        assert_eq!(
            annotations.get(keys::OBJECTSET_ID_ANNOTATION).map(String::as_str),
            Some("app")
        );
    }

    #[test]
    fn prior_owner_stamps_are_scrubbed_and_user_metadata_survives() {
        let live = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm1",
                "namespace": "workloads",
                "labels": {
                    "objectset.rio.cattle.io/hash": "33ed67317c57ea78702e369c4c025f8df88553cc",
                    "team": "storage",
                },
                "annotations": {
                    "objectset.rio.cattle.io/id": "some-assumed-old-id",
                    "meta.helm.sh/release-name": "previous-release",
                    "irrelevant": "note",
                },
            },
            "data": { "foo": "bar" },
        }));

        let merged = adopt(&rendered(), &live, &release());

        let labels = merged.metadata.labels.as_ref().expect("labels set");
        let annotations = merged.metadata.annotations.as_ref().expect("annotations set");

        // no objectset key survives unless it is ours
        assert_eq!(
            labels.get(keys::OBJECTSET_HASH_LABEL),
            Some(&release().objectset_hash())
        );
        assert_eq!(
            annotations.get(keys::OBJECTSET_ID_ANNOTATION).map(String::as_str),
            Some("app")
        );
        assert_eq!(
            annotations.get(keys::HELM_RELEASE_NAME_ANNOTATION).map(String::as_str),
            Some("app")
        );

        assert_eq!(labels.get("team").map(String::as_str), Some("storage"));
        assert_eq!(annotations.get("irrelevant").map(String::as_str), Some("note"));
    }

    #[test]
    fn adoption_is_idempotent() {
        let live = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm1",
                "namespace": "workloads",
                "labels": { "foo": "234" },
                "annotations": { "bar": "xzy" },
            },
            "data": { "foo": "bar" },
        }));

        let once = adopt(&rendered(), &live, &release());
        let twice = adopt(&rendered(), &once, &release());

        assert_eq!(once.metadata, twice.metadata);
        assert_eq!(once.data, twice.data);
    }

    #[test]
    fn owner_references_are_replaced() {
        let mut rendered = rendered();
        rendered.metadata.owner_references = Some(vec![
            k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
                api_version: "gitops.armada.dev/v1alpha1".to_owned(),
                kind: "BundleDeployment".to_owned(),
                name: "app".to_owned(),
                uid: "c85bfb53-a28e-4782-baaf-3c218a25f192".to_owned(),
                ..Default::default()
            },
        ]);
        let live = object(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm1",
                "namespace": "workloads",
                "ownerReferences": [{
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "name": "other",
                    "uid": "0000",
                }],
            },
            "data": {},
        }));

        let merged = adopt(&rendered, &live, &release());

        let refs = merged.metadata.owner_references.as_ref().expect("owner refs set");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "BundleDeployment");
    }
}
