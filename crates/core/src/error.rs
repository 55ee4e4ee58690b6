//! Domain error model.

use serde_json::Value;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// A single field-level schema failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Dotted/indexed path of the offending field (`items[0].quantity`), empty for the root.
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Raw data failed schema validation.
///
/// Carries every issue the validator found, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn render_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(path, message)],
        }
    }

    /// Paths of all offending fields, in report order.
    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.path.as_str()).collect()
    }

    /// Returns `true` when any issue is reported for `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

/// A named business rule rejected a candidate state.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct InvariantViolation {
    pub invariant_name: String,
    pub message: String,
    /// Name of the aggregate whose candidate state was rejected.
    pub aggregate: String,
    /// The complete candidate state the rule was evaluated against.
    pub data: Value,
}

/// Domain-level error.
///
/// Every variant is deterministic: retrying the same operation with the same input
/// reproduces the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Raw data failed schema validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),

    /// An update tried to change the identity field of an entity.
    #[error("identity field '{field}' of {entity} cannot change (from {from} to {to})")]
    IdentityChange {
        entity: String,
        field: String,
        from: Value,
        to: Value,
    },

    /// General domain failure (wraps failures raised by domain methods).
    #[error("domain error: {0}")]
    Domain(String),

    /// `emit_event` was given something that cannot become an event.
    #[error("invalid domain event: {0}")]
    InvalidEvent(String),

    /// A factory was constructed with missing or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A domain method was called that the aggregate does not define.
    #[error("{aggregate} has no method '{method}'")]
    UnknownMethod { aggregate: String, method: String },
}

impl DomainError {
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn invalid_event(msg: impl Into<String>) -> Self {
        Self::InvalidEvent(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Name of the violated invariant, if this is an invariant violation.
    pub fn invariant_name(&self) -> Option<&str> {
        match self {
            Self::InvariantViolation(v) => Some(&v.invariant_name),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_identity_change(&self) -> bool {
        matches!(self, Self::IdentityChange { .. })
    }
}
