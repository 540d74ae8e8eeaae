//! Tracing initialization for the Armada binaries.

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes `tracing` logging with options from the environment variable
/// given in the `env` parameter.
///
/// We force callers to provide a variable name so it can differ per binary,
/// e.g. `ARMADA_CONTROLLER_LOG` and `ARMADA_AGENT_LOG`. If the variable is
/// not set, the maximum log level defaults to INFO.
pub fn initialize_logging(env: &str) {
    let filter = EnvFilter::try_from_env(env)
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
