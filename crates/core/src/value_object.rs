//! Value objects: equality by value, not identity.
//!
//! Value objects are the reusable validated scalars that plug into an
//! [`ObjectSchema`](crate::schema::ObjectSchema) as field kinds. A field declared as
//! `FieldKind::value_object::<EmailAddress>()` accepts a raw value only when it
//! deserializes into the type *and* passes [`ValueObject::validate`]; the normalised,
//! re-serialized form is what lands in the record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker + validation hook for value objects.
///
/// Value objects are **immutable** and **compared by value**:
///
/// - **Value Object**: no identity (two value objects with same values are equal)
/// - **Entity**: has identity (two entities with the same identity value are the same entity)
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Percentage(u8);
///
/// impl ValueObject for Percentage {
///     fn validate(&self) -> Result<(), String> {
///         if self.0 > 100 { Err("must be at most 100".into()) } else { Ok(()) }
///     }
/// }
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug + Serialize + DeserializeOwned {
    /// Type name used in validation messages.
    fn type_name() -> &'static str {
        let full = core::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Business validation beyond the structural shape.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Parse, validate and normalise a raw value as `T`.
pub fn parse_value_object<T: ValueObject>(raw: &Value) -> Result<Value, String> {
    let parsed: T = serde_json::from_value(raw.clone())
        .map_err(|e| format!("invalid {}: {e}", T::type_name()))?;
    parsed.validate()?;
    serde_json::to_value(&parsed).map_err(|e| e.to_string())
}

/// A string that is non-empty after trimming. Stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("must not be empty".into());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl ValueObject for NonEmptyString {}

/// Lower-cased e-mail address with a single `@` and a dotted domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let normalised = value.trim().to_lowercase();
        let (local, domain) = normalised
            .split_once('@')
            .ok_or_else(|| format!("'{value}' is not an email address"))?;
        let domain_ok = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');
        if local.is_empty() || !domain_ok {
            return Err(format!("'{value}' is not an email address"));
        }
        Ok(Self(normalised))
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl ValueObject for EmailAddress {}

/// Amount in the currency's minor unit (e.g. cents) plus an ISO-4217 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }
}

impl ValueObject for Money {
    fn validate(&self) -> Result<(), String> {
        let valid = self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase());
        if !valid {
            return Err(format!("'{}' is not an ISO-4217 currency code", self.currency));
        }
        Ok(())
    }
}
