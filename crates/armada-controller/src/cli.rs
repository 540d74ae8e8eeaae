//! Types composing the CLI interface of the controller and agent binaries.

use clap::{Args, Parser};

/// A common set of commands used by the Armada binaries.
#[derive(Debug, PartialEq, Eq, Parser)]
pub enum Command {
    /// Print CRD objects.
    Crd,

    /// Run the controller.
    Run(RunArguments),
}

/// CLI arguments accepted when running.
#[derive(Debug, PartialEq, Eq, Args)]
pub struct RunArguments {
    /// Provides a specific namespace to watch (instead of watching all namespaces)
    #[arg(long, env, default_value = "")]
    pub watch_namespace: String,

    /// Address the Prometheus metrics endpoint binds to.
    #[arg(long, env, default_value = "0.0.0.0:8080")]
    pub metrics_bind_address: String,

    /// Disables metrics collection entirely.
    #[arg(long, env)]
    pub disable_metrics: bool,

    /// Seconds between two full reconciliations of a bundle.
    #[arg(long, env, default_value_t = 900)]
    pub requeue_seconds: u64,
}
