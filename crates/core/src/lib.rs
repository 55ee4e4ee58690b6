//! `domainforge-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns): the
//! schema contract and value objects, the entity engine, change history, and the
//! invariant engine.

pub mod entity;
pub mod error;
pub mod history;
pub mod invariant;
pub mod record;
pub mod schema;
pub mod value_object;

pub use entity::{Entity, EntityConfig, EntityFactory};
pub use error::{DomainError, DomainResult, FieldIssue, InvariantViolation, ValidationError};
pub use history::{FieldChange, HistoryEntry};
pub use invariant::{Invariant, InvariantSet};
pub use record::Record;
pub use schema::{FieldKind, ObjectSchema, Schema, SchemaRef, SerdeSchema};
pub use value_object::{EmailAddress, Money, NonEmptyString, ValueObject};
