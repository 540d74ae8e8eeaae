//! Core scheduling logic of the Armada controller: partitioning of rollout
//! targets, unavailability budgets, and state rollups per bundle.
//!
//! Everything in [`rollout`], [`limit`] and [`matcher`] is a pure function
//! over an in-memory snapshot of targets, so rollout decisions can be tested
//! without an API server.

pub mod cli;
pub mod limit;
pub mod logging;
pub mod matcher;
pub mod metrics;
pub mod rollout;
pub mod summary;
pub mod target;
