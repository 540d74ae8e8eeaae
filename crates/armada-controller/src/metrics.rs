//! Prometheus collectors for bundles and bundle deployments.

use armada_api::{
    bundle::Bundle,
    bundledeployment::BundleDeployment,
    keys,
    summary::{BundleState, Summary},
};
use kube::ResourceExt;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};
use snafu::{ResultExt, Snafu};

use crate::summary::deployment_state;

type Result<T, E = Error> = std::result::Result<T, E>;

const METRICS_NAMESPACE: &str = "armada";

const BUNDLE_LABELS: &[&str] = &["name", "namespace"];
const BUNDLE_STATE_LABELS: &[&str] = &["name", "namespace", "state"];
const BUNDLEDEPLOYMENT_LABELS: &[&str] = &[
    "name",
    "namespace",
    "cluster_name",
    "repo",
    "commit",
    "bundle",
    "bundle_namespace",
    "generation",
    "state",
];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to build collector {name:?}"))]
    BuildCollector {
        source: prometheus::Error,
        name: String,
    },

    #[snafu(display("failed to register collector with the registry"))]
    RegisterCollector { source: prometheus::Error },
}

/// All collectors exported by the controller. Values are recomputed from the
/// observed objects on every reconciliation pass.
#[derive(Clone)]
pub struct Metrics {
    /// One gauge per known state, e.g. `armada_bundle_ready`.
    bundle_states: Vec<(BundleState, IntGaugeVec)>,
    bundle_desired_ready: IntGaugeVec,
    bundle_state: IntGaugeVec,
    bundledeployment_state: IntGaugeVec,
    bundledeployment_observed: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let bundle_states = BundleState::ALL
            .into_iter()
            .map(|state| {
                let name = format!("bundle_{}", state.metric_suffix());
                IntGaugeVec::new(
                    Opts::new(
                        name.as_str(),
                        format!("Number of bundle deployments in the {state} state for this bundle."),
                    )
                    .namespace(METRICS_NAMESPACE),
                    BUNDLE_LABELS,
                )
                .map(|gauge| (state, gauge))
                .context(BuildCollectorSnafu { name })
            })
            .collect::<Result<Vec<_>>>()?;

        let bundle_desired_ready = IntGaugeVec::new(
            Opts::new(
                "bundle_desired_ready",
                "Number of bundle deployments that should be ready for this bundle.",
            )
            .namespace(METRICS_NAMESPACE),
            BUNDLE_LABELS,
        )
        .context(BuildCollectorSnafu {
            name: "bundle_desired_ready",
        })?;

        let bundle_state = IntGaugeVec::new(
            Opts::new(
                "bundle_state",
                "Number of bundle deployments of this bundle in the state given by the state label.",
            )
            .namespace(METRICS_NAMESPACE),
            BUNDLE_STATE_LABELS,
        )
        .context(BuildCollectorSnafu {
            name: "bundle_state",
        })?;

        let bundledeployment_state = IntGaugeVec::new(
            Opts::new(
                "bundledeployment_state",
                "Shows the state of this bundle deployment based on the state label. A value of 1 is true, 0 is false.",
            )
            .namespace(METRICS_NAMESPACE),
            BUNDLEDEPLOYMENT_LABELS,
        )
        .context(BuildCollectorSnafu {
            name: "bundledeployment_state",
        })?;

        let bundledeployment_observed = IntCounterVec::new(
            Opts::new(
                "bundledeployment_observations_total",
                "The total times that this bundle deployment has been observed.",
            )
            .namespace(METRICS_NAMESPACE),
            BUNDLEDEPLOYMENT_LABELS,
        )
        .context(BuildCollectorSnafu {
            name: "bundledeployment_observations_total",
        })?;

        Ok(Self {
            bundle_states,
            bundle_desired_ready,
            bundle_state,
            bundledeployment_state,
            bundledeployment_observed,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        for (_, gauge) in &self.bundle_states {
            registry
                .register(Box::new(gauge.clone()))
                .context(RegisterCollectorSnafu)?;
        }
        registry
            .register(Box::new(self.bundle_desired_ready.clone()))
            .context(RegisterCollectorSnafu)?;
        registry
            .register(Box::new(self.bundle_state.clone()))
            .context(RegisterCollectorSnafu)?;
        registry
            .register(Box::new(self.bundledeployment_state.clone()))
            .context(RegisterCollectorSnafu)?;
        registry
            .register(Box::new(self.bundledeployment_observed.clone()))
            .context(RegisterCollectorSnafu)?;
        Ok(())
    }

    /// Records the per-state gauges for one bundle from its status summary.
    pub fn collect_bundle(&self, bundle: &Bundle) {
        let name = bundle.name_any();
        let namespace = bundle.namespace().unwrap_or_default();
        let summary = bundle
            .status
            .as_ref()
            .map_or_else(Summary::default, |status| status.summary.clone());

        self.bundle_desired_ready
            .with_label_values(&[&name, &namespace])
            .set(i64::from(summary.desired_ready));

        for (state, gauge) in &self.bundle_states {
            gauge
                .with_label_values(&[&name, &namespace])
                .set(i64::from(summary.count(*state)));
        }
        for state in BundleState::ALL {
            self.bundle_state
                .with_label_values(&[&name, &namespace, &state.to_string()])
                .set(i64::from(summary.count(state)));
        }
    }

    /// Records the state gauges and bumps the observation counter for one
    /// bundle deployment.
    pub fn collect_bundle_deployment(&self, deployment: &BundleDeployment) {
        let labels = deployment.labels();
        let label = |key: &str| labels.get(key).cloned().unwrap_or_default();

        let name = deployment.name_any();
        let namespace = deployment.namespace().unwrap_or_default();
        let generation = deployment.metadata.generation.unwrap_or_default().to_string();
        let base = [
            name,
            namespace,
            label(keys::CLUSTER_LABEL),
            label(keys::REPO_LABEL),
            label(keys::COMMIT_LABEL),
            label(keys::BUNDLE_LABEL),
            label(keys::BUNDLE_NAMESPACE_LABEL),
            generation,
        ];

        let current = deployment_state(deployment);

        let mut values = base.iter().map(String::as_str).collect::<Vec<_>>();
        let current_state = current.to_string();
        values.push(&current_state);
        self.bundledeployment_observed.with_label_values(&values).inc();

        for state in BundleState::ALL {
            let state_name = state.to_string();
            let mut values = base.iter().map(String::as_str).collect::<Vec<_>>();
            values.push(&state_name);
            self.bundledeployment_state
                .with_label_values(&values)
                .set(i64::from(state == current));
        }
    }
}
