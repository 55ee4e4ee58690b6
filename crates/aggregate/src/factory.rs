//! Aggregate engine: entity engine + invariant engine + event overlay + bound methods.
//!
//! `create` and `update` are the only ways to obtain an [`Aggregate`]. Both are
//! all-or-nothing: schema validation and every invariant must pass before an instance
//! is returned, and a failure leaves the input instance untouched.

use std::sync::Arc;

use serde_json::Value;

use domainforge_core::{
    DomainError, DomainResult, Entity, EntityConfig, EntityFactory, Invariant, InvariantSet, Record,
    Schema, SchemaRef,
};
use domainforge_events::{WithEvents, update_with_events};

use crate::instance::{Aggregate, BoundEntity};
use crate::methods::{MethodFactory, MethodSet};

/// Builder for an [`AggregateFactory`].
///
/// `name`, `schema`, `identity` and a method factory are required; `build` reports the
/// first one missing.
#[derive(Default)]
pub struct AggregateConfig {
    name: String,
    schema: Option<SchemaRef>,
    identity: Option<String>,
    invariants: Vec<Invariant>,
    historize: bool,
    methods: Option<MethodFactory>,
}

impl AggregateConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn schema<S: Schema + 'static>(self, schema: S) -> Self {
        self.schema_ref(Arc::new(schema))
    }

    pub fn schema_ref(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn identity(mut self, field: impl Into<String>) -> Self {
        self.identity = Some(field.into());
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    pub fn invariants(mut self, invariants: impl IntoIterator<Item = Invariant>) -> Self {
        self.invariants.extend(invariants);
        self
    }

    pub fn historize(mut self, historize: bool) -> Self {
        self.historize = historize;
        self
    }

    /// Method factory; receives the factory each instance belongs to.
    pub fn methods<F>(self, factory: F) -> Self
    where
        F: Fn(&AggregateFactory) -> MethodSet + Send + Sync + 'static,
    {
        self.method_factory(Arc::new(factory))
    }

    pub fn method_factory(mut self, factory: MethodFactory) -> Self {
        self.methods = Some(factory);
        self
    }

    pub fn build(self) -> DomainResult<AggregateFactory> {
        let AggregateConfig {
            name,
            schema,
            identity,
            invariants,
            historize,
            methods,
        } = self;

        if name.trim().is_empty() {
            return Err(DomainError::configuration("aggregate name is required"));
        }
        let schema = schema.ok_or_else(|| DomainError::configuration(format!("{name}: schema is required")))?;
        let identity =
            identity.ok_or_else(|| DomainError::configuration(format!("{name}: identity field is required")))?;
        let methods =
            methods.ok_or_else(|| DomainError::configuration(format!("{name}: method factory is required")))?;

        let invariants = InvariantSet::from_rules(invariants)
            .map_err(|e| DomainError::configuration(format!("{name}: {e}")))?;
        let entities = EntityFactory::new(EntityConfig::new(name, schema, identity).historize(historize))?;

        tracing::debug!(
            aggregate = entities.name(),
            identity = entities.identity(),
            invariants = invariants.len(),
            historize,
            "aggregate factory built"
        );

        Ok(AggregateFactory {
            inner: Arc::new(FactoryInner {
                entities,
                invariants,
                methods,
            }),
        })
    }
}

struct FactoryInner {
    entities: EntityFactory,
    invariants: InvariantSet,
    methods: MethodFactory,
}

/// Creates, updates and derives aggregates of one kind.
///
/// Cheap to clone; clones share the same immutable configuration.
#[derive(Clone)]
pub struct AggregateFactory {
    inner: Arc<FactoryInner>,
}

impl AggregateFactory {
    pub fn builder(name: impl Into<String>) -> AggregateConfig {
        AggregateConfig::new(name)
    }

    pub fn name(&self) -> &str {
        self.inner.entities.name()
    }

    pub fn schema(&self) -> &SchemaRef {
        self.inner.entities.schema()
    }

    pub fn identity(&self) -> &str {
        self.inner.entities.identity()
    }

    pub fn invariants(&self) -> &InvariantSet {
        &self.inner.invariants
    }

    pub fn historize(&self) -> bool {
        self.inner.entities.historize()
    }

    pub(crate) fn method_factory(&self) -> &MethodFactory {
        &self.inner.methods
    }

    /// Validate `data`, check every invariant, bind methods and attach an empty event log.
    pub fn create(&self, data: Value) -> DomainResult<Aggregate> {
        let entity = self.inner.entities.create(data)?;
        self.check_invariants(entity.data())?;

        tracing::debug!(aggregate = self.name(), id = %entity, "aggregate created");
        Ok(self.bind(entity).with_events())
    }

    /// Rebuild an instance from stored plain data; same gates as [`create`](Self::create).
    pub fn rehydrate(&self, record: Record) -> DomainResult<Aggregate> {
        self.create(record.into_value())
    }

    /// Merge `patch`, re-validate, re-check invariants, rebind methods and carry the
    /// pending events of `instance` over to the successor.
    pub fn update(&self, instance: &Aggregate, patch: Value) -> DomainResult<Aggregate> {
        let next = self.inner.entities.update(instance.entity(), patch)?;
        self.check_invariants(next.data())?;

        tracing::debug!(
            aggregate = self.name(),
            id = %next,
            carried_events = instance.pending_events().len(),
            "aggregate updated"
        );
        Ok(update_with_events(instance, self.bind(next)))
    }

    fn check_invariants(&self, state: &Record) -> DomainResult<()> {
        self.inner.invariants.validate(self.name(), state)?;
        Ok(())
    }

    fn bind(&self, entity: Entity) -> BoundEntity {
        let methods = (self.inner.methods)(self);
        BoundEntity::new(entity, methods)
    }
}

impl core::fmt::Debug for AggregateFactory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AggregateFactory")
            .field("name", &self.name())
            .field("identity", &self.identity())
            .field("invariants", &self.invariants().names())
            .field("historize", &self.historize())
            .finish_non_exhaustive()
    }
}
