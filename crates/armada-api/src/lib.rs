//! API types shared by the Armada controller and agent.
//!
//! The custom resources follow the usual split: `Bundle` and `Cluster` live
//! upstream and are reconciled by the controller, `BundleDeployment` is the
//! per-cluster instance consumed by the agent.

pub mod bundle;
pub mod bundledeployment;
pub mod cluster;
pub mod condition;
pub mod keys;
pub mod summary;

// External re-exports
pub use k8s_openapi;
pub use kube;
