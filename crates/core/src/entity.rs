//! Entity engine: validated, immutable records whose equality is governed by one
//! identity field.
//!
//! An [`EntityFactory`] owns a schema and an identity field name. `create` validates raw
//! data into an [`Entity`]; `update` merges a patch onto the current data, validates the
//! result and returns a *new* entity. There is no API that mutates an entity in place.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{DomainError, DomainResult, ValidationError};
use crate::history::{HistoryEntry, extend_history};
use crate::record::Record;
use crate::schema::SchemaRef;

/// Configuration for an [`EntityFactory`].
#[derive(Debug, Clone)]
pub struct EntityConfig {
    pub name: String,
    pub schema: SchemaRef,
    pub identity: String,
    pub historize: bool,
}

impl EntityConfig {
    pub fn new(name: impl Into<String>, schema: SchemaRef, identity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema,
            identity: identity.into(),
            historize: false,
        }
    }

    pub fn historize(mut self, historize: bool) -> Self {
        self.historize = historize;
        self
    }
}

/// An immutable, validated record with identity-based equality.
#[derive(Debug, Clone)]
pub struct Entity {
    name: Arc<str>,
    identity: Arc<str>,
    data: Record,
    history: Option<Vec<HistoryEntry>>,
}

impl Entity {
    /// Name of the factory that produced this entity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the field that governs equality.
    pub fn identity_field(&self) -> &str {
        &self.identity
    }

    /// Identity value; `None` when absent or `null`.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(&self.identity).filter(|v| !v.is_null())
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn get_as<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.data.get_as(field)
    }

    /// Change history, when the factory historizes.
    pub fn history(&self) -> Option<&[HistoryEntry]> {
        self.history.as_deref()
    }

    /// Identity comparison. `None` and entities without an identity value never match.
    pub fn equals(&self, other: Option<&Entity>) -> bool {
        let Some(other) = other else {
            return false;
        };
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => self.identity == other.identity && a == b,
            _ => false,
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.equals(Some(other))
    }
}

impl core::fmt::Display for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.id() {
            Some(Value::String(s)) => write!(f, "{}({}={})", self.name, self.identity, s),
            Some(v) => write!(f, "{}({}={})", self.name, self.identity, v),
            None => write!(f, "{}({}=<none>)", self.name, self.identity),
        }
    }
}

/// Builds and updates [`Entity`] values for one schema.
#[derive(Debug, Clone)]
pub struct EntityFactory {
    name: Arc<str>,
    identity: Arc<str>,
    schema: SchemaRef,
    historize: bool,
}

impl EntityFactory {
    pub fn new(config: EntityConfig) -> DomainResult<Self> {
        let EntityConfig {
            name,
            schema,
            identity,
            historize,
        } = config;

        if name.trim().is_empty() {
            return Err(DomainError::configuration("entity name is required"));
        }
        if identity.trim().is_empty() {
            return Err(DomainError::configuration(format!(
                "{name}: identity field is required"
            )));
        }
        let declared = schema.field_names();
        if !declared.is_empty() && !declared.iter().any(|f| *f == identity) {
            return Err(DomainError::configuration(format!(
                "{name}: identity field '{identity}' is not declared by the schema"
            )));
        }

        Ok(Self {
            name: name.into(),
            identity: identity.into(),
            schema,
            historize,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn historize(&self) -> bool {
        self.historize
    }

    /// Validate `data` and build a new entity.
    pub fn create(&self, data: Value) -> DomainResult<Entity> {
        let record = self.schema.validate(&data)?;
        if record.get(&self.identity).is_none_or(Value::is_null) {
            return Err(ValidationError::single(
                self.identity.to_string(),
                "identity field must be present",
            )
            .into());
        }

        tracing::debug!(entity = %self.name, "entity created");
        Ok(Entity {
            name: self.name.clone(),
            identity: self.identity.clone(),
            data: record,
            history: self.historize.then(Vec::new),
        })
    }

    /// Merge `patch` onto `instance`, validate, and return the successor entity.
    ///
    /// Fails with [`DomainError::IdentityChange`] when the patch would change the identity
    /// value, even if the new value would not validate.
    pub fn update(&self, instance: &Entity, patch: Value) -> DomainResult<Entity> {
        let current_id = instance.data.get(&self.identity).cloned().unwrap_or(Value::Null);
        let touched = patch
            .get(&*self.identity)
            .filter(|v| **v != current_id)
            .cloned();

        let merged = instance.data.merged(&patch)?;
        let record = match (self.schema.validate(&merged.to_value()), touched) {
            (Ok(record), _) => record,
            (Err(err), Some(to)) => {
                // a restated identity may only differ in form; compare what the schema accepted
                let (accepted, _) = self.schema.validate_lenient(&merged.to_value());
                return match accepted.get(&*self.identity) {
                    Some(normalised) if *normalised == current_id => Err(err.into()),
                    _ => Err(self.identity_change(current_id, to)),
                };
            }
            (Err(err), None) => return Err(err.into()),
        };

        let next_id = record.get(&self.identity).cloned().unwrap_or(Value::Null);
        if next_id != current_id {
            return Err(self.identity_change(current_id, next_id));
        }

        let history = match (&instance.history, self.historize) {
            (_, false) => None,
            (prior, true) => Some(extend_history(
                prior.as_deref().unwrap_or_default(),
                &instance.data,
                &record,
            )),
        };

        tracing::debug!(entity = %self.name, "entity updated");
        Ok(Entity {
            name: self.name.clone(),
            identity: self.identity.clone(),
            data: record,
            history,
        })
    }

    fn identity_change(&self, from: Value, to: Value) -> DomainError {
        tracing::debug!(entity = %self.name, field = %self.identity, "rejected identity change");
        DomainError::IdentityChange {
            entity: self.name.to_string(),
            field: self.identity.to_string(),
            from,
            to,
        }
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::schema::{FieldKind, ObjectSchema};
    use proptest::prelude::*;
    use serde_json::json;

    fn people() -> EntityFactory {
        let schema = ObjectSchema::new()
            .field("id", FieldKind::string())
            .field("score", FieldKind::integer())
            .into_ref();
        EntityFactory::new(EntityConfig::new("Person", schema, "id").historize(true)).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            .. ProptestConfig::default()
        })]

        /// Property: equality follows the identity value, never the other fields.
        #[test]
        fn equality_ignores_non_identity_fields(
            id_a in "[a-z]{1,4}",
            id_b in "[a-z]{1,4}",
            score_a in any::<i64>(),
            score_b in any::<i64>(),
        ) {
            let f = people();
            let a = f.create(json!({"id": id_a, "score": score_a})).unwrap();
            let b = f.create(json!({"id": id_b, "score": score_b})).unwrap();
            prop_assert_eq!(a == b, id_a == id_b);
            prop_assert_eq!(a.equals(Some(&b)), b.equals(Some(&a)));
        }

        /// Property: each update appends exactly one entry iff the value changed.
        #[test]
        fn history_grows_only_on_change(scores in prop::collection::vec(-5i64..5, 1..20)) {
            let f = people();
            let mut current = f.create(json!({"id": "p", "score": 0})).unwrap();
            let mut expected = 0usize;
            let mut last = 0i64;

            for score in scores {
                current = f.update(&current, json!({"score": score})).unwrap();
                if score != last {
                    expected += 1;
                    let entry = current.history().unwrap().last().unwrap();
                    let change = entry.change_for("score").unwrap();
                    prop_assert_eq!(&change.from, &json!(last));
                    prop_assert_eq!(&change.to, &json!(score));
                }
                last = score;
                prop_assert_eq!(current.history().unwrap().len(), expected);
            }
        }
    }
}
