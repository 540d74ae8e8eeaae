//! Status conditions for the Armada custom resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Condition types used across the Armada custom resources.
pub mod conditions {
    /// Set once a resource has fully converged on its desired state.
    pub const READY: &str = "Ready";

    /// Written by the agent after a deployment attempt; `False` means the
    /// apply itself failed.
    pub const DEPLOYED: &str = "Deployed";
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, JsonSchema, PartialEq, Serialize,
)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// A single status condition as persisted on a resource.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: ConditionStatus) -> Self {
        Self {
            type_: type_.to_owned(),
            status,
            reason: None,
            message: None,
        }
    }

    /// A `False` condition with the `Error` reason and the given message.
    pub fn error(type_: &str, message: impl Into<String>) -> Self {
        Self {
            type_: type_.to_owned(),
            status: ConditionStatus::False,
            reason: Some("Error".to_owned()),
            message: Some(message.into()),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Replaces the condition of the same type, appending it if absent.
pub fn set(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

pub fn get<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// Returns whether the condition of the given type exists and is `False`.
pub fn is_false(conditions: &[Condition], type_: &str) -> bool {
    get(conditions, type_).is_some_and(|c| c.status == ConditionStatus::False)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_same_type() {
        let mut conditions = vec![Condition::new(conditions::READY, ConditionStatus::Unknown)];

        set(
            &mut conditions,
            Condition::error(conditions::READY, "configmap v1 ns/cm1 missing"),
        );
        set(
            &mut conditions,
            Condition::new(conditions::DEPLOYED, ConditionStatus::True),
        );

        assert_eq!(conditions.len(), 2);
        assert_eq!(
            get(&conditions, conditions::READY)
                .and_then(|c| c.message.as_deref()),
            Some("configmap v1 ns/cm1 missing")
        );
        assert!(is_false(&conditions, conditions::READY));
        assert!(!is_false(&conditions, conditions::DEPLOYED));
    }

    #[test]
    fn status_serializes_capitalized() {
        let condition = Condition::new(conditions::READY, ConditionStatus::True);
        let json = serde_json::to_value(&condition).expect("condition serializes");

        assert_eq!(json["status"], "True");
        assert_eq!(json["type"], "Ready");
    }
}
