//! `domainforge-aggregate`: the aggregate engine.
//!
//! Composes the entity engine, the invariant engine and the event overlay, binds
//! caller-supplied domain methods to every instance, and derives new factories through
//! [`AggregateFactory::extend`].
//!
//! ```ignore
//! let orders = AggregateFactory::builder("Order")
//!     .schema(order_schema())
//!     .identity("id")
//!     .invariant(Invariant::new("placed orders have items", has_items_when_placed))
//!     .methods(|factory| {
//!         let f = factory.clone();
//!         MethodSet::new().with("place", move |order: &Aggregate, _| {
//!             let mut placed = f.update(order, json!({"status": "PLACED"}))?;
//!             placed.emit_event("OrderPlaced", json!({"orderId": order.id()}))?;
//!             Ok(placed)
//!         })
//!     })
//!     .build()?;
//! ```

pub mod extend;
pub mod factory;
pub mod instance;
pub mod methods;

pub use extend::ExtendOptions;
pub use factory::{AggregateConfig, AggregateFactory};
pub use instance::{Aggregate, AggregateExt, BoundEntity};
pub use methods::{DerivedMethodFactory, Method, MethodFactory, MethodSet};

/// Everything needed to define and drive aggregates.
pub mod prelude {
    pub use crate::{Aggregate, AggregateExt, AggregateFactory, ExtendOptions, MethodSet};
    pub use domainforge_core::{
        DomainError, DomainResult, FieldKind, Invariant, ObjectSchema, Record, Schema, SchemaRef,
    };
    pub use domainforge_events::{DomainEvent, Event, EventFactory, TypedEventFactory, WithEvents};
}
