//! Invariant engine: named business rules evaluated against complete candidate states.

use std::sync::Arc;

use crate::error::{DomainError, DomainResult, InvariantViolation};
use crate::record::Record;

/// Predicate over a candidate state.
pub type InvariantCheck = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// A named rule that every state an aggregate may occupy must satisfy.
#[derive(Clone)]
pub struct Invariant {
    name: String,
    check: InvariantCheck,
    message: Option<String>,
}

impl Invariant {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn holds(&self, state: &Record) -> bool {
        (self.check)(state)
    }

    fn violation(&self, aggregate: &str, state: &Record) -> InvariantViolation {
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("Invariant \"{}\" violated for aggregate {aggregate}", self.name));
        InvariantViolation {
            invariant_name: self.name.clone(),
            message,
            aggregate: aggregate.to_string(),
            data: state.to_value(),
        }
    }
}

impl core::fmt::Debug for Invariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Invariant")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Ordered invariant list with unique names.
///
/// Order is evaluation order; for derived factories parent rules come first.
#[derive(Debug, Clone, Default)]
pub struct InvariantSet {
    rules: Vec<Invariant>,
}

impl InvariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate names.
    pub fn from_rules(rules: impl IntoIterator<Item = Invariant>) -> DomainResult<Self> {
        let mut set = Self::new();
        for rule in rules {
            set.push(rule)?;
        }
        Ok(set)
    }

    pub fn push(&mut self, rule: Invariant) -> DomainResult<()> {
        if self.contains(rule.name()) {
            return Err(DomainError::configuration(format!(
                "duplicate invariant name '{}'",
                rule.name()
            )));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Parent rules followed by `additional`, keeping both groups in declaration order.
    pub fn concat(&self, additional: impl IntoIterator<Item = Invariant>) -> DomainResult<Self> {
        let mut out = self.clone();
        for rule in additional {
            out.push(rule)?;
        }
        Ok(out)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(Invariant::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Invariant> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule in order and stop at the first failure.
    pub fn validate(&self, aggregate: &str, state: &Record) -> Result<(), InvariantViolation> {
        validate(&self.rules, aggregate, state)
    }
}

/// Evaluate `invariants` in order against `state`, reporting the first one that fails.
pub fn validate(invariants: &[Invariant], aggregate: &str, state: &Record) -> Result<(), InvariantViolation> {
    match invariants.iter().find(|rule| !rule.holds(state)) {
        Some(rule) => {
            tracing::debug!(aggregate, invariant = rule.name(), "invariant violated");
            Err(rule.violation(aggregate, state))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(v: serde_json::Value) -> Record {
        Record::from_value(v).unwrap()
    }

    fn non_negative() -> Invariant {
        Invariant::new("non-negative", |s: &Record| s.i64("n").is_some_and(|n| n >= 0))
    }

    fn even() -> Invariant {
        Invariant::new("even", |s: &Record| s.i64("n").is_some_and(|n| n % 2 == 0))
            .with_message("n must be even")
    }

    #[test]
    fn first_failing_rule_is_reported_in_order() {
        let set = InvariantSet::from_rules([non_negative(), even()]).unwrap();

        let err = set.validate("Counter", &state(json!({"n": -3}))).unwrap_err();
        assert_eq!(err.invariant_name, "non-negative");
        assert_eq!(err.message, "Invariant \"non-negative\" violated for aggregate Counter");
        assert_eq!(err.aggregate, "Counter");
        assert_eq!(err.data, json!({"n": -3}));

        let err = set.validate("Counter", &state(json!({"n": 3}))).unwrap_err();
        assert_eq!(err.invariant_name, "even");
        assert_eq!(err.message, "n must be even");

        assert!(set.validate("Counter", &state(json!({"n": 4}))).is_ok());
    }

    #[test]
    fn concat_keeps_parent_rules_first_and_rejects_duplicates() {
        let parent = InvariantSet::from_rules([non_negative()]).unwrap();
        let child = parent.concat([even()]).unwrap();

        assert_eq!(child.names(), vec!["non-negative", "even"]);
        assert_eq!(parent.len(), 1);
        assert!(matches!(
            child.concat([non_negative()]),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn empty_set_accepts_everything() {
        assert!(InvariantSet::new().validate("X", &Record::new()).is_ok());
    }
}
