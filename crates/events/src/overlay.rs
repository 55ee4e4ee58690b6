//! Event-sourcing overlay: an append-only event log held alongside an immutable value.
//!
//! [`Evented<T>`] pairs a value with a private [`EventLog`]. The value stays frozen
//! (only shared access through `Deref`); the log is the one piece of mutable state and
//! can only be appended to, copied out, or cleared by its owner.
//!
//! Update chains keep unpublished events alive through [`update_with_events`], which
//! replays the previous instance's log onto its successor with the original
//! timestamps.

use serde_json::Value;

use domainforge_core::{DomainResult, Entity};

use crate::event::{DomainEvent, EventSource};

/// Ordered, append-only buffer of pending domain events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<DomainEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn clear(&mut self) {
        self.events.clear();
    }

    pub fn as_slice(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A value plus its pending domain events.
#[derive(Debug, Clone)]
pub struct Evented<T> {
    inner: T,
    log: EventLog,
}

impl<T> Evented<T> {
    /// Wrap `inner` with an empty log.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            log: EventLog::new(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Split into the value and its pending events.
    pub fn into_parts(self) -> (T, Vec<DomainEvent>) {
        (self.inner, self.log.events)
    }

    /// Append an event built from a bare type name or from an [`EventFactory`](crate::EventFactory).
    ///
    /// Returns `self` so calls can be chained:
    ///
    /// ```ignore
    /// order.emit_event("OrderPlaced", json!({"total": 10}))?
    ///      .emit_event(&NotifyCustomer, json!({"email": email}))?;
    /// ```
    pub fn emit_event<'a>(&mut self, source: impl Into<EventSource<'a>>, payload: Value) -> DomainResult<&mut Self> {
        let event = source.into().build(payload)?;
        tracing::trace!(event_type = event.event_type(), "domain event emitted");
        self.log.push(event);
        Ok(self)
    }

    /// Append an already-built event unchanged (timestamp included).
    pub fn record_event(&mut self, event: DomainEvent) -> &mut Self {
        self.log.push(event);
        self
    }

    /// Copy of the pending events; changing it never affects this instance.
    pub fn domain_events(&self) -> Vec<DomainEvent> {
        self.log.events.clone()
    }

    /// Read-only view of the pending events.
    pub fn pending_events(&self) -> &[DomainEvent] {
        self.log.as_slice()
    }

    pub fn has_events(&self) -> bool {
        !self.log.is_empty()
    }

    pub fn clear_domain_events(&mut self) -> &mut Self {
        self.log.clear();
        self
    }
}

impl<T> core::ops::Deref for Evented<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// Pending events do not take part in equality.
impl<T: PartialEq> PartialEq for Evented<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: core::fmt::Display> core::fmt::Display for Evented<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.inner, f)
    }
}

/// Attach an event log. Values that already carry one are returned unchanged.
pub trait WithEvents: Sized {
    type Inner;

    fn with_events(self) -> Evented<Self::Inner>;
}

impl<T> WithEvents for Evented<T> {
    type Inner = T;

    fn with_events(self) -> Evented<T> {
        self
    }
}

impl WithEvents for Entity {
    type Inner = Entity;

    fn with_events(self) -> Evented<Entity> {
        Evented::new(self)
    }
}

/// Wrap `updated` and replay every pending event of `original` onto it, in order and
/// with the original type, payload and timestamp.
///
/// When `original` has no pending events this is a fresh wrap.
pub fn update_with_events<O, T>(original: &Evented<O>, updated: T) -> Evented<T> {
    let mut next = Evented::new(updated);
    if original.has_events() {
        tracing::trace!(replayed = original.log.len(), "carrying pending events forward");
        for event in original.pending_events() {
            next.record_event(event.clone());
        }
    }
    next
}
