//! Domain events and the event-sourcing overlay.
//!
//! - [`DomainEvent`], [`Event`], [`EventFactory`]: what an aggregate records
//! - [`Evented`], [`WithEvents`], [`update_with_events`]: where it records them
//! - [`EventBus`]: where a repository hands them off after persisting

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod overlay;

pub use bus::{EventBus, Subscription};
pub use event::{DomainEvent, Event, EventFactory, EventSource, TypedEventFactory};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use overlay::{EventLog, Evented, WithEvents, update_with_events};
