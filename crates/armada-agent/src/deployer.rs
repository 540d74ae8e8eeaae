//! The apply loop for one bundle deployment: render, arbitrate per resource,
//! act, and reduce the outcomes into the deployment status.

use std::{collections::BTreeSet, time::Duration};

use armada_api::{
    bundledeployment::{BundleDeployment, BundleDeploymentStatus},
    condition::{self, Condition, ConditionStatus, conditions},
};
use tracing::{debug, warn};

use crate::{
    adoption,
    ownership::{Action, Release, arbitrate},
    render::{RenderedResource, ResourceKey, ResourceProvider},
    status::{ResourceOutcome, reduce},
    store::{ObjectStore, StoreError},
};

/// Writes are attempted this many times before the resource is reported as
/// failed. Conflicts re-read the live object between attempts.
const MAX_WRITE_ATTEMPTS: u32 = 3;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Applies bundle deployments against one target cluster.
///
/// Reconciliations for the same deployment are expected to be serialized by
/// the caller; the deployer itself keeps no state between calls.
pub struct Deployer<S, P> {
    store: S,
    provider: P,
}

impl<S: ObjectStore, P: ResourceProvider> Deployer<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        Self { store, provider }
    }

    /// Runs one apply pass and returns the deployment's new status.
    ///
    /// This never fails: rendering problems surface as a `False` `Deployed`
    /// condition, per-resource problems through the `Ready` condition.
    pub async fn apply(&self, deployment: &BundleDeployment) -> BundleDeploymentStatus {
        let mut status = deployment.status.clone().unwrap_or_default();

        let rendered = match self.provider.render(deployment) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(error = %err, "failed to render deployment");
                condition::set(
                    &mut status.conditions,
                    Condition::error(conditions::DEPLOYED, err.to_string()),
                );
                return status;
            }
        };

        let release = Release::for_deployment(deployment);
        let take_ownership = deployment
            .spec
            .options
            .helm
            .as_ref()
            .is_some_and(|helm| helm.take_ownership);
        let previously_applied = status
            .resources
            .iter()
            .map(ResourceKey::from_resource)
            .collect::<BTreeSet<_>>();

        let mut outcomes = Vec::with_capacity(rendered.len());
        for resource in &rendered {
            let outcome = self
                .apply_resource(resource, &previously_applied, &release, take_ownership)
                .await;
            outcomes.push(outcome);
        }

        // Resources stay on the books while they were part of the last
        // applied set, even when they are currently missing or lost; that is
        // what keeps the conflict sticky on the next pass.
        status.resources = outcomes
            .iter()
            .filter(|outcome| {
                matches!(outcome, ResourceOutcome::Applied { .. })
                    || previously_applied.contains(outcome.key())
            })
            .map(|outcome| outcome.key().to_resource())
            .collect();

        let failed = outcomes
            .iter()
            .any(|outcome| matches!(outcome, ResourceOutcome::Failed { .. }));
        let deployed = if failed {
            Condition::error(conditions::DEPLOYED, "one or more resources failed to apply")
        } else {
            status.applied_deployment_id = deployment.spec.deployment_id.clone();
            Condition::new(conditions::DEPLOYED, ConditionStatus::True)
        };
        condition::set(&mut status.conditions, deployed);

        reduce(&mut status, &outcomes);

        status
    }

    async fn apply_resource(
        &self,
        resource: &RenderedResource,
        previously_applied: &BTreeSet<ResourceKey>,
        release: &Release,
        take_ownership: bool,
    ) -> ResourceOutcome {
        let key = resource.key.clone();

        for attempt in 0..MAX_WRITE_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BASE_DELAY * 2_u32.pow(attempt - 1)).await;
            }

            let live = match self.store.get(&key).await {
                Ok(live) => live,
                Err(err @ StoreError::Transient { .. }) => {
                    warn!(%key, error = %err, "failed to read live resource, retrying");
                    continue;
                }
                Err(err) => {
                    return ResourceOutcome::Failed {
                        key,
                        message: err.to_string(),
                    };
                }
            };

            let action = arbitrate(
                &resource.object,
                live.as_ref(),
                previously_applied.contains(&key),
                release,
                take_ownership,
            );

            let written = match action {
                Action::Create => {
                    let mut object = resource.object.clone();
                    adoption::stamp(&mut object, release);
                    self.store.create(&key, object).await.map(|_| ())
                }
                Action::Update => match &live {
                    // Updating is re-merging the desired form over the live
                    // object: content merged at adoption time survives, and
                    // the carried resource version fails a concurrent writer
                    // over into the conflict retry.
                    Some(live) => {
                        let object = adoption::adopt(&resource.object, live, release);
                        self.store.update(&key, object).await.map(|_| ())
                    }
                    // arbitrate only returns Update for existing resources
                    None => continue,
                },
                Action::Adopt(merged) => {
                    debug!(%key, "adopting pre-existing resource");
                    self.store.update(&key, *merged).await.map(|_| ())
                }
                Action::NotOwnedByUs => {
                    debug!(%key, "live resource is not owned by us");
                    return ResourceOutcome::NotOwnedByUs { key };
                }
                Action::Missing => {
                    debug!(%key, "previously applied resource is gone");
                    return ResourceOutcome::Missing { key };
                }
            };

            match written {
                Ok(()) => return ResourceOutcome::Applied { key },
                Err(err @ (StoreError::Conflict { .. } | StoreError::Transient { .. })) => {
                    debug!(%key, error = %err, "write did not go through, re-reading");
                }
                Err(err) => {
                    return ResourceOutcome::Failed {
                        key,
                        message: err.to_string(),
                    };
                }
            }
        }

        ResourceOutcome::Failed {
            key,
            message: format!("write still conflicted after {MAX_WRITE_ATTEMPTS} attempts"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    use armada_api::{
        bundledeployment::{
            BundleDeploymentOptions, BundleDeploymentSpec, HelmOptions,
        },
        keys,
    };
    use async_trait::async_trait;
    use kube::core::DynamicObject;
    use serde_json::json;

    use super::*;
    use crate::render::RenderError;

    /// In-memory object store with optimistic concurrency, standing in for
    /// the downstream API server.
    #[derive(Clone, Default)]
    struct MemoryStore {
        objects: Arc<Mutex<BTreeMap<ResourceKey, DynamicObject>>>,
        version: Arc<AtomicU64>,
    }

    impl MemoryStore {
        fn next_version(&self) -> String {
            self.version.fetch_add(1, Ordering::SeqCst).to_string()
        }

        fn insert(&self, key: &ResourceKey, mut object: DynamicObject) -> DynamicObject {
            object.metadata.resource_version = Some(self.next_version());
            self.objects
                .lock()
                .unwrap()
                .insert(key.clone(), object.clone());
            object
        }

        fn get_sync(&self, key: &ResourceKey) -> Option<DynamicObject> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        fn strip_metadata(&self, key: &ResourceKey) {
            let mut objects = self.objects.lock().unwrap();
            let object = objects.get_mut(key).expect("object exists");
            object.metadata.labels = None;
            object.metadata.annotations = None;
        }

        fn remove(&self, key: &ResourceKey) {
            self.objects.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn get(&self, key: &ResourceKey) -> Result<Option<DynamicObject>, StoreError> {
            Ok(self.get_sync(key))
        }

        async fn create(
            &self,
            key: &ResourceKey,
            object: DynamicObject,
        ) -> Result<DynamicObject, StoreError> {
            if self.get_sync(key).is_some() {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    resource_version: None,
                });
            }
            Ok(self.insert(key, object))
        }

        async fn update(
            &self,
            key: &ResourceKey,
            object: DynamicObject,
        ) -> Result<DynamicObject, StoreError> {
            let live_version = self
                .get_sync(key)
                .ok_or_else(|| StoreError::NotFound { key: key.clone() })?
                .metadata
                .resource_version;
            if object.metadata.resource_version != live_version {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    resource_version: object.metadata.resource_version,
                });
            }
            Ok(self.insert(key, object))
        }

        async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
            self.objects
                .lock()
                .unwrap()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound { key: key.clone() })
        }
    }

    /// Renders a fixed ConfigMap, like the configmap.yaml asset the
    /// deployment content points at.
    struct ConfigMapProvider;

    fn cm_key() -> ResourceKey {
        ResourceKey::new("v1", "ConfigMap", "workloads", "cm1")
    }

    impl ResourceProvider for ConfigMapProvider {
        fn render(
            &self,
            _deployment: &BundleDeployment,
        ) -> Result<Vec<RenderedResource>, RenderError> {
            let object: DynamicObject = serde_json::from_value(json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": { "name": "cm1", "namespace": "workloads" },
                "data": { "key": "value" },
            }))
            .expect("static object is valid");

            Ok(vec![RenderedResource {
                key: cm_key(),
                object,
            }])
        }
    }

    fn bundle_deployment(name: &str, take_ownership: bool) -> BundleDeployment {
        let mut deployment = BundleDeployment::new(
            name,
            BundleDeploymentSpec {
                deployment_id: "BundleDeploymentConfigMap".to_owned(),
                staged_deployment_id: "BundleDeploymentConfigMap".to_owned(),
                options: BundleDeploymentOptions {
                    default_namespace: Some("workloads".to_owned()),
                    helm: Some(HelmOptions {
                        take_ownership,
                        release_name: None,
                    }),
                },
            },
        );
        deployment.metadata.namespace = Some("cluster-ns".to_owned());
        deployment
    }

    fn existing_configmap(
        data: serde_json::Value,
        labels: serde_json::Value,
        annotations: serde_json::Value,
    ) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "cm1",
                "namespace": "workloads",
                "labels": labels,
                "annotations": annotations,
            },
            "data": data,
        }))
        .expect("static object is valid")
    }

    fn ready_message(status: &BundleDeploymentStatus) -> String {
        condition::get(&status.conditions, conditions::READY)
            .and_then(|condition| condition.message.clone())
            .unwrap_or_default()
    }

    fn is_adopted(object: &DynamicObject) -> bool {
        let labels = object.metadata.labels.clone().unwrap_or_default();
        let annotations = object.metadata.annotations.clone().unwrap_or_default();

        labels.get(keys::MANAGED_BY_LABEL).map(String::as_str) == Some("Helm")
            && annotations.contains_key(keys::HELM_RELEASE_NAME_ANNOTATION)
            && annotations.contains_key(keys::HELM_RELEASE_NAMESPACE_ANNOTATION)
    }

    #[tokio::test]
    async fn creates_and_reports_ready_on_an_empty_cluster() {
        let store = MemoryStore::default();
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);
        let deployment = bundle_deployment("fresh", true);

        let status = deployer.apply(&deployment).await;

        assert!(status.ready);
        assert!(status.non_modified);
        assert_eq!(status.applied_deployment_id, "BundleDeploymentConfigMap");
        assert_eq!(status.resources.len(), 1);

        let live = store.get_sync(&cm_key()).expect("configmap created");
        assert!(is_adopted(&live));
    }

    #[tokio::test]
    async fn adopts_a_clean_resource_and_merges_content() {
        let store = MemoryStore::default();
        store.insert(
            &cm_key(),
            existing_configmap(json!({ "foo": "bar" }), json!({}), json!({})),
        );
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let status = deployer.apply(&bundle_deployment("adopt-clean", true)).await;

        assert!(status.ready, "status not ready: {status:?}");
        let live = store.get_sync(&cm_key()).expect("configmap exists");
        assert!(is_adopted(&live));
        assert_eq!(
            live.data["data"],
            json!({ "foo": "bar", "key": "value" })
        );
    }

    #[tokio::test]
    async fn adopts_a_resource_with_prior_owner_metadata() {
        let store = MemoryStore::default();
        store.insert(
            &cm_key(),
            existing_configmap(
                json!({ "foo": "bar" }),
                json!({ "objectset.rio.cattle.io/hash": "33ed67317c57ea78702e369c4c025f8df88553cc" }),
                json!({ "objectset.rio.cattle.io/id": "some-assumed-old-id" }),
            ),
        );
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let status = deployer
            .apply(&bundle_deployment("adopt-wrangler-metadata", true))
            .await;

        assert!(status.ready);
        let live = store.get_sync(&cm_key()).expect("configmap exists");
        assert!(is_adopted(&live));
        assert_eq!(live.data["data"], json!({ "foo": "bar", "key": "value" }));

        // the prior owner's id never survives adoption
        let annotations = live.metadata.annotations.clone().unwrap_or_default();
        assert_eq!(
            annotations.get(keys::OBJECTSET_ID_ANNOTATION).map(String::as_str),
            Some("adopt-wrangler-metadata")
        );
    }

    #[tokio::test]
    async fn adopts_a_resource_with_invalid_prior_owner_metadata() {
        let store = MemoryStore::default();
        store.insert(
            &cm_key(),
            existing_configmap(
                json!({ "foo": "bar" }),
                json!({ "objectset.rio.cattle.io/hash": "234" }),
                json!({ "objectset.rio.cattle.io/id": "$#@" }),
            ),
        );
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let status = deployer
            .apply(&bundle_deployment("adopt-invalid-wrangler-metadata", true))
            .await;

        assert!(status.ready);
        let live = store.get_sync(&cm_key()).expect("configmap exists");
        assert!(is_adopted(&live));
        assert_eq!(live.data["data"], json!({ "foo": "bar", "key": "value" }));
    }

    #[tokio::test]
    async fn adopts_a_resource_with_random_metadata() {
        let store = MemoryStore::default();
        store.insert(
            &cm_key(),
            existing_configmap(
                json!({ "foo": "bar" }),
                json!({ "foo": "234" }),
                json!({ "bar": "xzy" }),
            ),
        );
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let status = deployer
            .apply(&bundle_deployment("adopt-random-metadata", true))
            .await;

        assert!(status.ready);
        let live = store.get_sync(&cm_key()).expect("configmap exists");
        assert!(is_adopted(&live));
        assert_eq!(live.data["data"], json!({ "foo": "bar", "key": "value" }));

        // unrelated user metadata survives adoption
        let labels = live.metadata.labels.clone().unwrap_or_default();
        let annotations = live.metadata.annotations.clone().unwrap_or_default();
        assert_eq!(labels.get("foo").map(String::as_str), Some("234"));
        assert_eq!(annotations.get("bar").map(String::as_str), Some("xzy"));
    }

    #[tokio::test]
    async fn competing_deployments_complain_about_ownership() {
        let store = MemoryStore::default();
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        // "one" creates the configmap and owns it
        let mut one = bundle_deployment("one", false);
        one.status = Some(deployer.apply(&one).await);
        assert!(one.status.as_ref().is_some_and(|status| status.ready));

        // "two" adopts it away
        let mut two = bundle_deployment("two", true);
        two.status = Some(deployer.apply(&two).await);
        let two_status = two.status.as_ref().expect("status set");
        assert!(two_status.ready);
        assert!(two_status.non_modified);

        // the next pass of "one" finds the stamp of "two" and gives up
        let one_status = deployer.apply(&one).await;
        assert!(!one_status.ready);
        assert!(!one_status.non_modified);
        assert!(ready_message(&one_status).contains("not owned by us"));
        assert!(
            one_status.modified_status[0]
                .to_string()
                .contains("not owned by us")
        );

        // while "two" stays healthy
        let two_status = deployer.apply(&two).await;
        assert!(two_status.ready);
    }

    #[tokio::test]
    async fn stripped_metadata_turns_into_an_ownership_conflict() {
        let store = MemoryStore::default();
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let mut deployment = bundle_deployment("adopt-clean", true);
        deployment.status = Some(deployer.apply(&deployment).await);
        assert!(deployment.status.as_ref().is_some_and(|status| status.ready));

        // a human removes all labels and annotations
        store.strip_metadata(&cm_key());

        let status = deployer.apply(&deployment).await;
        assert!(!status.ready);
        assert!(ready_message(&status).contains("not owned by us"));
    }

    #[tokio::test]
    async fn deleted_resource_is_reported_missing() {
        let store = MemoryStore::default();
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let mut deployment = bundle_deployment("adopt-clean", true);
        deployment.status = Some(deployer.apply(&deployment).await);

        store.remove(&cm_key());

        let status = deployer.apply(&deployment).await;
        assert!(!status.ready);
        assert!(ready_message(&status).contains("missing"));
        assert_eq!(
            status.modified_status[0].to_string(),
            "v1 ConfigMap workloads/cm1 missing"
        );
    }

    #[tokio::test]
    async fn render_failures_surface_on_the_deployed_condition() {
        struct FailingProvider;
        impl ResourceProvider for FailingProvider {
            fn render(
                &self,
                deployment: &BundleDeployment,
            ) -> Result<Vec<RenderedResource>, RenderError> {
                Err(RenderError {
                    deployment_id: deployment.spec.deployment_id.clone(),
                    message: "chart values are not a map".to_owned(),
                })
            }
        }

        let deployer = Deployer::new(MemoryStore::default(), FailingProvider);
        let status = deployer.apply(&bundle_deployment("broken", false)).await;

        assert!(condition::is_false(&status.conditions, conditions::DEPLOYED));
        assert!(status.applied_deployment_id.is_empty());
    }

    #[tokio::test]
    async fn repeated_apply_is_stable() {
        let store = MemoryStore::default();
        store.insert(
            &cm_key(),
            existing_configmap(json!({ "foo": "bar" }), json!({}), json!({})),
        );
        let deployer = Deployer::new(store.clone(), ConfigMapProvider);

        let mut deployment = bundle_deployment("adopt-clean", true);
        deployment.status = Some(deployer.apply(&deployment).await);
        let first = store.get_sync(&cm_key()).expect("configmap exists");

        deployment.status = Some(deployer.apply(&deployment).await);
        let second = store.get_sync(&cm_key()).expect("configmap exists");

        assert_eq!(first.data, second.data);
        assert_eq!(first.metadata.labels, second.metadata.labels);
        assert_eq!(first.metadata.annotations, second.metadata.annotations);
        assert!(deployment.status.as_ref().is_some_and(|status| status.ready));
    }
}
