//! Partitioning of rollout targets and the budget gate that decides how far
//! a rollout may advance in one pass.
//!
//! Everything here is a pure function over the target snapshot; persisting
//! the outcome is the reconciler's job.

use std::{collections::BTreeMap, sync::LazyLock};

use armada_api::{
    bundle::{BundleStatus, RolloutStrategy},
    summary::PartitionStatus,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    limit::{self, limit},
    matcher::{self, ClusterMatcher},
    summary::summarize,
    target::{Target, is_up_to_date, unavailable},
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Below this many targets auto partitioning is disabled and all targets end
/// up in a single partition.
pub const AUTO_PARTITION_THRESHOLD: usize = 200;

/// Auto partition size used when the strategy does not set one.
static DEFAULT_AUTO_PARTITION_SIZE: LazyLock<IntOrString> =
    LazyLock::new(|| IntOrString::String("25%".to_owned()));

/// Rollouts tolerate no unavailable partitions unless configured otherwise.
const DEFAULT_MAX_UNAVAILABLE_PARTITIONS: IntOrString = IntOrString::Int(0);

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve an unavailability budget"))]
    ResolveBudget { source: limit::Error },

    #[snafu(display("failed to build the cluster matcher for partition {partition:?}"))]
    BuildMatcher {
        source: matcher::Error,
        partition: String,
    },
}

/// One wave of the rollout: a named subset of targets plus its bookkeeping.
#[derive(Debug)]
pub struct Partition<'a> {
    pub status: PartitionStatus,
    pub targets: Vec<&'a Target>,
}

/// Distributes targets into ordered partitions based on the bundle's rollout
/// strategy.
///
/// The strategy is taken from the first target's bundle; all targets of one
/// pass belong to the same bundle. An absent strategy behaves like an empty
/// one.
pub fn partitions(targets: &[Target]) -> Result<Vec<Partition<'_>>> {
    let strategy = rollout_strategy(targets);
    let partitions = if strategy.partitions.is_empty() {
        auto_partition(&strategy, targets)?
    } else {
        manual_partition(&strategy, targets)?
    };

    for (index, partition) in partitions.iter().enumerate() {
        debug!(
            index,
            name = %partition.status.name,
            count = partition.status.count,
            max_unavailable = partition.status.max_unavailable,
            "computed partition"
        );
    }

    Ok(partitions)
}

fn rollout_strategy(targets: &[Target]) -> RolloutStrategy {
    targets
        .first()
        .and_then(|target| target.bundle.spec.rollout_strategy.clone())
        .unwrap_or_default()
}

fn auto_partition<'a>(
    strategy: &RolloutStrategy,
    targets: &'a [Target],
) -> Result<Vec<Partition<'a>>> {
    if matches!(&strategy.auto_partition_size, Some(IntOrString::Int(size)) if *size <= 0) {
        debug!("auto partitioning disabled, all targets end up in one partition");
        return single_partition(strategy, targets);
    }

    if targets.len() < AUTO_PARTITION_THRESHOLD {
        debug!(
            count = targets.len(),
            "auto partitioning disabled, fewer than {AUTO_PARTITION_THRESHOLD} targets"
        );
        return single_partition(strategy, targets);
    }

    let max_size = limit(
        targets.len() as i32,
        &[
            strategy.auto_partition_size.as_ref(),
            Some(&DEFAULT_AUTO_PARTITION_SIZE),
        ],
    )
    .context(ResolveBudgetSnafu)? as usize;

    let mut partitions = Vec::new();
    let mut remaining = targets;
    let mut offset = 0;

    while !remaining.is_empty() {
        let end = remaining.len().min(max_size);
        let name = format!("Partition {offset} - {}", offset + end);

        append_partition(
            &mut partitions,
            name,
            remaining[..end].iter().collect(),
            &[strategy.max_unavailable.as_ref()],
        )?;

        remaining = &remaining[end..];
        offset += end;
    }

    Ok(partitions)
}

fn single_partition<'a>(
    strategy: &RolloutStrategy,
    targets: &'a [Target],
) -> Result<Vec<Partition<'a>>> {
    let mut partitions = Vec::new();
    append_partition(
        &mut partitions,
        "All".to_owned(),
        targets.iter().collect(),
        &[strategy.max_unavailable.as_ref()],
    )?;
    Ok(partitions)
}

/// Builds one partition per declared definition, in declaration order.
///
/// Definitions claim targets non-exclusively: a target matching several
/// definitions appears in every matching partition. Targets matched by no
/// definition are dropped from the rollout.
fn manual_partition<'a>(
    strategy: &RolloutStrategy,
    targets: &'a [Target],
) -> Result<Vec<Partition<'a>>> {
    let mut partitions = Vec::new();

    for definition in &strategy.partitions {
        let matcher = ClusterMatcher::new(
            definition.cluster_name.as_deref(),
            definition.cluster_group.as_deref(),
            definition.cluster_group_selector.as_ref(),
            definition.cluster_selector.as_ref(),
        )
        .with_context(|_| BuildMatcherSnafu {
            partition: definition.name.clone().unwrap_or_default(),
        })?;

        let selected = targets
            .iter()
            .filter(|target| target_matches(&matcher, target))
            .collect();

        append_partition(
            &mut partitions,
            definition.name.clone().unwrap_or_default(),
            selected,
            &[
                definition.max_unavailable.as_ref(),
                strategy.max_unavailable.as_ref(),
            ],
        )?;
    }

    Ok(partitions)
}

/// Whether any of the target's cluster groups, or for groupless clusters the
/// cluster alone, falls into the partition.
fn target_matches(matcher: &ClusterMatcher, target: &Target) -> bool {
    let cluster_name = target.cluster.name_any();
    let cluster_labels = target.cluster.labels();

    if target.cluster_groups.is_empty() {
        return matcher.matches(&cluster_name, "", &BTreeMap::new(), cluster_labels);
    }

    target.cluster_groups.iter().any(|group| {
        matcher.matches(
            &cluster_name,
            &group.name_any(),
            group.labels(),
            cluster_labels,
        )
    })
}

fn append_partition<'a>(
    partitions: &mut Vec<Partition<'a>>,
    name: String,
    targets: Vec<&'a Target>,
    max_unavailable: &[Option<&IntOrString>],
) -> Result<()> {
    let max_unavailable =
        limit(targets.len() as i32, max_unavailable).context(ResolveBudgetSnafu)?;

    let status = PartitionStatus {
        name,
        count: targets.len() as i32,
        max_unavailable,
        unavailable: unavailable(&targets),
        summary: summarize(&targets),
    };

    partitions.push(Partition { status, targets });
    Ok(())
}

/// Refreshes a partition's bookkeeping and reports whether it exceeds its
/// unavailability budget.
///
/// The gate never fails; problems during summarization surface as states in
/// the summary itself.
pub fn update_status_and_check_unavailable(
    status: &mut PartitionStatus,
    targets: &[&Target],
) -> bool {
    status.unavailable = unavailable(targets);
    status.summary = summarize(targets);

    status.unavailable > status.max_unavailable
}

/// The outcome of one scheduling pass over a bundle's targets.
#[derive(Debug)]
pub struct RolloutPlan<'a> {
    pub partitions: Vec<Partition<'a>>,
    pub unavailable_partitions: i32,
    pub max_unavailable_partitions: i32,

    /// Targets cleared for dispatch, in partition order.
    pub released: Vec<&'a Target>,
}

/// Evaluates the partition gate over all partitions.
///
/// Partitions are visited in order. A partition's targets are released for
/// dispatch when it is reached; the next partition is only opened once the
/// current one has all targets up to date. Once more partitions are over
/// their budget than `maxUnavailablePartitions` tolerates, the rollout stops
/// releasing entirely.
pub fn plan(targets: &[Target]) -> Result<RolloutPlan<'_>> {
    let strategy = rollout_strategy(targets);
    let mut partitions = partitions(targets)?;

    let max_unavailable_partitions = limit(
        partitions.len() as i32,
        &[
            strategy.max_unavailable_partitions.as_ref(),
            Some(&DEFAULT_MAX_UNAVAILABLE_PARTITIONS),
        ],
    )
    .context(ResolveBudgetSnafu)?;

    let mut unavailable_partitions = 0;
    let mut released = Vec::new();

    for partition in &mut partitions {
        if update_status_and_check_unavailable(&mut partition.status, &partition.targets) {
            unavailable_partitions += 1;
        }
        if unavailable_partitions > max_unavailable_partitions {
            debug!(
                name = %partition.status.name,
                unavailable_partitions,
                max_unavailable_partitions,
                "too many unavailable partitions, rollout paused"
            );
            break;
        }

        released.extend(partition.targets.iter().copied());

        if !partition.targets.iter().all(|target| is_up_to_date(target)) {
            // The current partition is still rolling, the next one stays
            // closed.
            break;
        }
    }

    Ok(RolloutPlan {
        partitions,
        unavailable_partitions,
        max_unavailable_partitions,
        released,
    })
}

/// Recomputes a bundle's rollout status from the current target snapshot.
pub fn update_status(status: &mut BundleStatus, targets: &[Target]) -> Result<()> {
    let strategy = rollout_strategy(targets);
    let plan = plan(targets)?;
    let refs = targets.iter().collect::<Vec<_>>();

    status.max_unavailable = limit(
        targets.len() as i32,
        &[strategy.max_unavailable.as_ref()],
    )
    .context(ResolveBudgetSnafu)?;
    status.unavailable = unavailable(&refs);
    status.max_unavailable_partitions = plan.max_unavailable_partitions;
    status.unavailable_partitions = plan.unavailable_partitions;
    status.summary = summarize(&refs);
    status.partitions = plan
        .partitions
        .into_iter()
        .map(|partition| partition.status)
        .collect();

    Ok(())
}
