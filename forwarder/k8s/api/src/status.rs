use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// The observed state of a forwarder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLogForwarderStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,

    #[serde(default, skip_serializing_if = "NamedConditions::is_empty")]
    pub inputs: NamedConditions,

    #[serde(default, skip_serializing_if = "NamedConditions::is_empty")]
    pub outputs: NamedConditions,

    #[serde(default, skip_serializing_if = "NamedConditions::is_empty")]
    pub filters: NamedConditions,

    #[serde(default, skip_serializing_if = "NamedConditions::is_empty")]
    pub pipelines: NamedConditions,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    Ready,
    Degraded,
    Validation,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Reason {
    /// The spec is ill-formed or contains unknown references.
    Invalid,
    /// The spec refers to resources that can't be located.
    MissingResource,
    /// The spec defines a valid object that is never used.
    Unused,
    Connecting,
    ValidationFailure,
    /// A lookup failed; the reconcile should be retried.
    Transient,
    Deprecated,
    Migrated,
}

/// An ordered list of conditions with at most one condition per type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

/// Conditions keyed by entity name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct NamedConditions(BTreeMap<String, Conditions>);

fn now() -> DateTime<Utc> {
    #[cfg(not(test))]
    let timestamp = Utc::now();
    #[cfg(test)]
    let timestamp = DateTime::<Utc>::MIN_UTC;
    timestamp
}

// === impl Condition ===

impl Condition {
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: Option<Reason>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status,
            reason,
            message: message.into(),
            last_transition_time: now(),
        }
    }

    pub fn ready() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, None, "")
    }

    pub fn not_ready(reason: Reason, message: impl Into<String>) -> Self {
        Self::new(
            ConditionType::Ready,
            ConditionStatus::False,
            Some(reason),
            message,
        )
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::not_ready(Reason::Invalid, message)
    }

    pub fn missing_resource(message: impl Into<String>) -> Self {
        Self::not_ready(Reason::MissingResource, message)
    }

    /// A warning that leaves readiness untouched.
    pub fn degraded(reason: Reason, message: impl Into<String>) -> Self {
        Self::new(
            ConditionType::Degraded,
            ConditionStatus::True,
            Some(reason),
            message,
        )
    }

    pub fn validation_failure(message: impl Into<String>) -> Self {
        Self::new(
            ConditionType::Validation,
            ConditionStatus::True,
            Some(Reason::ValidationFailure),
            message,
        )
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    /// True when the condition is a `Ready` verdict other than `True`.
    pub fn is_not_ready(&self) -> bool {
        self.type_ == ConditionType::Ready && !self.is_true()
    }

    fn same_state(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// === impl Conditions ===

impl Conditions {
    pub fn new(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut cs = Self::default();
        for c in conditions {
            cs.set(c);
        }
        cs
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Adds or replaces the condition of the same type. Returns true when the
    /// set changed. An unchanged condition keeps its transition time.
    pub fn set(&mut self, condition: Condition) -> bool {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) if existing.same_state(&condition) => false,
            Some(existing) => {
                *existing = condition;
                true
            }
            None => {
                self.0.push(condition);
                true
            }
        }
    }

    pub fn remove(&mut self, type_: ConditionType) {
        self.0.retain(|c| c.type_ != type_);
    }

    pub fn is_ready(&self) -> bool {
        self.get(ConditionType::Ready)
            .map(Condition::is_true)
            .unwrap_or(false)
    }

    pub fn is_not_ready(&self) -> bool {
        self.0.iter().any(Condition::is_not_ready)
    }

    /// Replaces these conditions with `new`, keeping the transition time of
    /// any condition whose state did not change.
    pub fn synchronize(&mut self, new: &Conditions) {
        for c in new.iter() {
            self.set(c.clone());
        }
        self.0.retain(|old| new.get(old.type_).is_some());
    }
}

impl FromIterator<Condition> for Conditions {
    fn from_iter<T: IntoIterator<Item = Condition>>(iter: T) -> Self {
        Self::new(iter)
    }
}

// === impl NamedConditions ===

impl NamedConditions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Conditions> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Conditions)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Records a condition for `name`.
    ///
    /// Readiness is monotonic: once an entity has a non-Ready verdict a later
    /// `Ready=True` is ignored, while another non-Ready verdict refines it.
    pub fn set(&mut self, name: &str, condition: Condition) -> bool {
        let conds = self.0.entry(name.to_string()).or_default();
        if condition.type_ == ConditionType::Ready && condition.is_true() && conds.is_not_ready() {
            return false;
        }
        conds.set(condition)
    }

    pub fn remove(&mut self, name: &str) -> Option<Conditions> {
        self.0.remove(name)
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.get(name).map(Conditions::is_ready).unwrap_or(false)
    }

    pub fn is_not_ready(&self, name: &str) -> bool {
        self.get(name).map(Conditions::is_not_ready).unwrap_or(false)
    }

    /// True when no entity carries a failing `Ready` condition.
    pub fn is_all_ready(&self) -> bool {
        !self.0.values().any(Conditions::is_not_ready)
    }

    /// Names of the entities that are not ready, with their Ready condition.
    pub fn not_ready(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.0.iter().filter_map(|(name, conds)| {
            conds
                .get(ConditionType::Ready)
                .filter(|c| !c.is_true())
                .map(|c| (name.as_str(), c))
        })
    }

    pub fn synchronize(&mut self, new: &NamedConditions) {
        for (name, conds) in new.0.iter() {
            self.0.entry(name.clone()).or_default().synchronize(conds);
        }
        self.0.retain(|name, _| new.0.contains_key(name));
    }
}

// === impl ClusterLogForwarderStatus ===

impl ClusterLogForwarderStatus {
    pub fn is_ready(&self) -> bool {
        self.conditions.is_ready()
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions.get(ConditionType::Ready)
    }

    /// Folds `new` into the previously published status so that conditions
    /// which did not change keep their transition time.
    pub fn synchronize(&mut self, new: &ClusterLogForwarderStatus) {
        self.conditions.synchronize(&new.conditions);
        self.inputs.synchronize(&new.inputs);
        self.outputs.synchronize(&new.outputs);
        self.filters.synchronize(&new.filters);
        self.pipelines.synchronize(&new.pipelines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn readiness_is_monotonic() {
        let mut named = NamedConditions::default();
        assert!(named.set("es", Condition::missing_resource("secret \"s\" not found")));
        assert!(!named.set("es", Condition::ready()));
        assert!(named.is_not_ready("es"));

        // A later failure refines the verdict.
        assert!(named.set("es", Condition::invalid("bad url")));
        let cond = named.get("es").unwrap().get(ConditionType::Ready).unwrap();
        assert_eq!(cond.reason, Some(Reason::Invalid));
        assert!(!named.is_all_ready());
    }

    #[test]
    fn degraded_does_not_affect_readiness() {
        let mut named = NamedConditions::default();
        named.set("app", Condition::ready());
        named.set("app", Condition::degraded(Reason::Deprecated, "old field"));
        assert!(named.is_ready("app"));
        assert!(named.is_all_ready());
        assert_eq!(named.get("app").unwrap().iter().count(), 2);
    }

    #[test]
    fn synchronize_keeps_transition_time_for_unchanged_conditions() {
        let earlier = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let mut old = ClusterLogForwarderStatus::default();
        let mut ready = Condition::ready();
        ready.last_transition_time = earlier;
        old.conditions.set(ready);
        old.outputs.set("gone", Condition::ready());

        let mut new = ClusterLogForwarderStatus::default();
        new.conditions.set(Condition::ready());
        new.outputs.set("es", Condition::invalid("bad"));

        old.synchronize(&new);
        assert_eq!(
            old.ready_condition().unwrap().last_transition_time,
            earlier
        );
        assert_eq!(old.outputs.names().collect::<Vec<_>>(), vec!["es"]);
    }

    #[test]
    fn serializes_kube_condition_shape() {
        let cond = Condition::invalid("output \"es\" is bad");
        let mut json = serde_json::to_value(&cond).unwrap();
        assert!(json
            .as_object_mut()
            .unwrap()
            .remove("lastTransitionTime")
            .is_some());
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Ready",
                "status": "False",
                "reason": "Invalid",
                "message": "output \"es\" is bad",
            })
        );
    }
}
