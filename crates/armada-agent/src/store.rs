//! Typed access to the target cluster's API server.

use async_trait::async_trait;
use kube::core::DynamicObject;
use snafu::Snafu;

use crate::render::ResourceKey;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("{key} not found"))]
    NotFound { key: ResourceKey },

    #[snafu(display("conflicting write to {key}, resource version {resource_version:?} is stale"))]
    Conflict {
        key: ResourceKey,
        resource_version: Option<String>,
    },

    /// Network-level trouble; safe to retry.
    #[snafu(display("transient failure talking to the API server: {message}"))]
    Transient { message: String },

    /// Validation or authorization failure; retrying without an input change
    /// is pointless.
    #[snafu(display("request rejected by the API server: {message}"))]
    Fatal { message: String },
}

/// The agent's only window onto the target cluster.
///
/// Updates carry the resource version they were read at; a stale version
/// fails with [`StoreError::Conflict`] and the caller re-reads and retries.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the live object, or `None` when it does not exist.
    async fn get(&self, key: &ResourceKey) -> Result<Option<DynamicObject>, StoreError>;

    async fn create(
        &self,
        key: &ResourceKey,
        object: DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    async fn update(
        &self,
        key: &ResourceKey,
        object: DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;
}
