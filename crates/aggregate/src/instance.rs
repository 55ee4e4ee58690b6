//! Aggregate instances: a frozen entity, its bound methods, and its pending events.

use serde_json::Value;

use domainforge_core::{DomainError, DomainResult, Entity};
use domainforge_events::{Evented, WithEvents};

use crate::methods::MethodSet;

/// An entity with the domain methods of the factory that built it.
#[derive(Debug, Clone)]
pub struct BoundEntity {
    entity: Entity,
    methods: MethodSet,
}

impl BoundEntity {
    pub(crate) fn new(entity: Entity, methods: MethodSet) -> Self {
        Self { entity, methods }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains(name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.names()
    }
}

impl core::ops::Deref for BoundEntity {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

impl PartialEq for BoundEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl core::fmt::Display for BoundEntity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.entity, f)
    }
}

impl WithEvents for BoundEntity {
    type Inner = BoundEntity;

    fn with_events(self) -> Evented<BoundEntity> {
        Evented::new(self)
    }
}

/// A fully constructed aggregate: validated data, invariants satisfied, methods bound,
/// event log attached.
///
/// Data is reachable through `Deref` (`aggregate.data()`, `aggregate.id()`,
/// `aggregate.equals(..)`); events through the [`Evented`] API.
pub type Aggregate = Evented<BoundEntity>;

/// Calling bound domain methods on an [`Aggregate`].
pub trait AggregateExt {
    /// Invoke the domain method `name` on this instance.
    fn call(&self, name: &str, args: Value) -> DomainResult<Aggregate>;
}

impl AggregateExt for Aggregate {
    fn call(&self, name: &str, args: Value) -> DomainResult<Aggregate> {
        let method = self.methods().get(name).cloned().ok_or_else(|| DomainError::UnknownMethod {
            aggregate: self.name().to_string(),
            method: name.to_string(),
        })?;
        tracing::trace!(aggregate = self.name(), method = name, "calling domain method");
        method(self, args)
    }
}
