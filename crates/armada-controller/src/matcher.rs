//! Matching of clusters and cluster groups against manually declared
//! partitions.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use snafu::Snafu;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display("label selector with binary operator {operator:?} must have values"))]
    BinaryOperatorWithoutValues { operator: String },

    #[snafu(display("label selector with unary operator {operator:?} must not have values"))]
    UnaryOperatorWithValues { operator: String },

    #[snafu(display("label selector has an invalid operator {operator:?}"))]
    InvalidOperator { operator: String },
}

/// One compiled selector requirement. `NotIn` and `DoesNotExist` also match
/// objects that do not carry the key at all, following the standard selector
/// semantics.
#[derive(Debug)]
enum Requirement {
    Eq { key: String, value: String },
    In { key: String, values: Vec<String> },
    NotIn { key: String, values: Vec<String> },
    Exists { key: String },
    DoesNotExist { key: String },
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Eq { key, value } => labels.get(key) == Some(value),
            Self::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Self::NotIn { key, values } => labels.get(key).is_none_or(|v| !values.contains(v)),
            Self::Exists { key } => labels.contains_key(key),
            Self::DoesNotExist { key } => !labels.contains_key(key),
        }
    }
}

/// A [`LabelSelector`] compiled into a flat requirement list, so the
/// per-target loop only performs map lookups. An empty selector selects
/// everything.
#[derive(Debug, Default)]
struct CompiledSelector {
    requirements: Vec<Requirement>,
}

impl CompiledSelector {
    fn compile(selector: &LabelSelector) -> Result<Self> {
        let mut requirements = Vec::new();

        // match_labels are the equivalent of the "In" operator with a single
        // value each.
        if let Some(labels) = &selector.match_labels {
            requirements.extend(labels.iter().map(|(key, value)| Requirement::Eq {
                key: key.clone(),
                value: value.clone(),
            }));
        }

        for requirement in selector.match_expressions.iter().flatten() {
            let key = requirement.key.clone();
            let compiled = match requirement.operator.as_str() {
                operator @ ("In" | "NotIn") => match &requirement.values {
                    Some(values) if !values.is_empty() => {
                        let values = values.clone();
                        if operator == "In" {
                            Requirement::In { key, values }
                        } else {
                            Requirement::NotIn { key, values }
                        }
                    }
                    _ => return BinaryOperatorWithoutValuesSnafu { operator }.fail(),
                },
                operator @ ("Exists" | "DoesNotExist") => match &requirement.values {
                    Some(values) if !values.is_empty() => {
                        return UnaryOperatorWithValuesSnafu { operator }.fail();
                    }
                    _ => {
                        if operator == "Exists" {
                            Requirement::Exists { key }
                        } else {
                            Requirement::DoesNotExist { key }
                        }
                    }
                },
                operator => return InvalidOperatorSnafu { operator }.fail(),
            };
            requirements.push(compiled);
        }

        Ok(Self { requirements })
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|requirement| requirement.matches(labels))
    }
}

/// Decides whether a cluster and one of its cluster groups fall into a
/// manually declared partition.
///
/// Built once per partition definition, then invoked per target, so selector
/// compilation stays out of the matching loop. The matcher never mutates its
/// inputs.
#[derive(Debug, Default)]
pub struct ClusterMatcher {
    cluster_name: Option<String>,
    cluster_group: Option<String>,
    cluster_group_selector: Option<CompiledSelector>,
    cluster_selector: Option<CompiledSelector>,
}

impl ClusterMatcher {
    pub fn new(
        cluster_name: Option<&str>,
        cluster_group: Option<&str>,
        cluster_group_selector: Option<&LabelSelector>,
        cluster_selector: Option<&LabelSelector>,
    ) -> Result<Self> {
        Ok(Self {
            cluster_name: cluster_name.filter(|n| !n.is_empty()).map(str::to_owned),
            cluster_group: cluster_group.filter(|n| !n.is_empty()).map(str::to_owned),
            cluster_group_selector: cluster_group_selector
                .map(CompiledSelector::compile)
                .transpose()?,
            cluster_selector: cluster_selector.map(CompiledSelector::compile).transpose()?,
        })
    }

    /// The logical AND of all populated criteria; absent criteria are
    /// wildcards.
    pub fn matches(
        &self,
        cluster_name: &str,
        cluster_group: &str,
        cluster_group_labels: &BTreeMap<String, String>,
        cluster_labels: &BTreeMap<String, String>,
    ) -> bool {
        if self
            .cluster_name
            .as_deref()
            .is_some_and(|name| name != cluster_name)
        {
            return false;
        }
        if self
            .cluster_group
            .as_deref()
            .is_some_and(|group| group != cluster_group)
        {
            return false;
        }
        if self
            .cluster_group_selector
            .as_ref()
            .is_some_and(|selector| !selector.matches(cluster_group_labels))
        {
            return false;
        }
        if self
            .cluster_selector
            .as_ref()
            .is_some_and(|selector| !selector.matches(cluster_labels))
        {
            return false;
        }
        true
    }
}
