use std::borrow::Cow;
use std::marker::PhantomData;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use domainforge_core::{DomainError, DomainResult};

/// Keys owned by the event envelope; payloads may not use them.
pub const RESERVED_KEYS: [&str; 2] = ["type", "timestamp"];

/// A strongly-typed domain event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - named by a **stable** type identifier (e.g. "sales.order.placed")
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable event name/type identifier.
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time). `None` means "now".
    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// Something that happened to an aggregate, queued for later publication.
///
/// Serializes flat: `{"type": .., ...payload, "timestamp": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl DomainEvent {
    /// Build an event stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: Value) -> DomainResult<Self> {
        Self::at(event_type, payload, Utc::now())
    }

    /// Build an event with an explicit timestamp.
    pub fn at(event_type: impl Into<String>, payload: Value, timestamp: DateTime<Utc>) -> DomainResult<Self> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(DomainError::invalid_event("event type must not be empty"));
        }
        let payload = match payload {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(DomainError::invalid_event(format!(
                    "payload of '{event_type}' must be an object, received {other}"
                )));
            }
        };
        if let Some(key) = RESERVED_KEYS.iter().find(|k| payload.contains_key(**k)) {
            return Err(DomainError::invalid_event(format!(
                "payload of '{event_type}' uses reserved key '{key}'"
            )));
        }
        Ok(Self {
            event_type,
            payload,
            timestamp,
        })
    }

    /// Convert a typed event.
    pub fn from_typed<E: Event>(event: &E) -> DomainResult<Self> {
        let payload = serde_json::to_value(event)
            .map_err(|e| DomainError::invalid_event(format!("{}: {e}", event.event_type())))?;
        Self::at(
            event.event_type(),
            payload,
            event.occurred_at().unwrap_or_else(Utc::now),
        )
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Read the payload back as a typed event.
    pub fn to_typed<E: Event>(&self) -> DomainResult<E> {
        serde_json::from_value(Value::Object(self.payload.clone()))
            .map_err(|e| DomainError::invalid_event(format!("{}: {e}", self.event_type)))
    }
}

/// Builds events from raw payloads, performing its own validation.
///
/// Any closure `Fn(Value) -> anyhow::Result<DomainEvent>` is a factory.
pub trait EventFactory {
    fn create(&self, payload: Value) -> anyhow::Result<DomainEvent>;
}

impl<F> EventFactory for F
where
    F: Fn(Value) -> anyhow::Result<DomainEvent>,
{
    fn create(&self, payload: Value) -> anyhow::Result<DomainEvent> {
        self(payload)
    }
}

/// Event factory for a typed [`Event`]: the payload must deserialize into `E`.
pub struct TypedEventFactory<E> {
    _event: PhantomData<fn() -> E>,
}

impl<E> TypedEventFactory<E> {
    pub fn new() -> Self {
        Self { _event: PhantomData }
    }
}

impl<E> Default for TypedEventFactory<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> core::fmt::Debug for TypedEventFactory<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("TypedEventFactory")
            .field(&core::any::type_name::<E>())
            .finish()
    }
}

impl<E: Event> EventFactory for TypedEventFactory<E> {
    fn create(&self, payload: Value) -> anyhow::Result<DomainEvent> {
        let event: E = serde_json::from_value(payload)
            .with_context(|| format!("invalid payload for {}", core::any::type_name::<E>()))?;
        Ok(DomainEvent::from_typed(&event)?)
    }
}

/// What `emit_event` accepts: a bare event type or a factory.
pub enum EventSource<'a> {
    Type(Cow<'a, str>),
    Factory(&'a dyn EventFactory),
}

impl EventSource<'_> {
    pub(crate) fn build(self, payload: Value) -> DomainResult<DomainEvent> {
        match self {
            EventSource::Type(event_type) => DomainEvent::new(event_type.into_owned(), payload),
            EventSource::Factory(factory) => factory
                .create(payload)
                .map_err(|e| DomainError::invalid_event(format!("{e:#}"))),
        }
    }
}

impl<'a> From<&'a str> for EventSource<'a> {
    fn from(value: &'a str) -> Self {
        EventSource::Type(Cow::Borrowed(value))
    }
}

impl From<String> for EventSource<'_> {
    fn from(value: String) -> Self {
        EventSource::Type(Cow::Owned(value))
    }
}

impl<'a> From<&'a dyn EventFactory> for EventSource<'a> {
    fn from(value: &'a dyn EventFactory) -> Self {
        EventSource::Factory(value)
    }
}

impl<'a, F: EventFactory> From<&'a F> for EventSource<'a> {
    fn from(value: &'a F) -> Self {
        EventSource::Factory(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Renamed {
        name: String,
    }

    impl Event for Renamed {
        fn event_type(&self) -> &'static str {
            "person.renamed"
        }
    }

    #[test]
    fn serializes_flat() {
        let event = DomainEvent::new("OrderPlaced", json!({"orderId": "o-1"})).unwrap();
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], json!("OrderPlaced"));
        assert_eq!(wire["orderId"], json!("o-1"));
        assert!(wire.get("timestamp").is_some());

        let back: DomainEvent = serde_json::from_value(wire).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn rejects_malformed_events() {
        assert!(matches!(DomainEvent::new("", Value::Null), Err(DomainError::InvalidEvent(_))));
        assert!(matches!(DomainEvent::new("X", json!(3)), Err(DomainError::InvalidEvent(_))));
        assert!(matches!(
            DomainEvent::new("X", json!({"type": "Y"})),
            Err(DomainError::InvalidEvent(_))
        ));
    }

    #[test]
    fn typed_factory_validates_payload() {
        let factory = TypedEventFactory::<Renamed>::new();
        let event = factory.create(json!({"name": "Ada"})).unwrap();
        assert_eq!(event.event_type(), "person.renamed");
        assert_eq!(event.to_typed::<Renamed>().unwrap().name, "Ada");

        assert!(factory.create(json!({"nom": "Ada"})).is_err());
    }

    #[test]
    fn closures_are_factories() {
        let factory = |payload: Value| DomainEvent::new("Pinged", payload).map_err(anyhow::Error::from);
        let source = EventSource::from(&factory);
        let event = source.build(json!({"n": 1})).unwrap();
        assert_eq!(event.get("n"), Some(&json!(1)));
    }
}
