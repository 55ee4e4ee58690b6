//! In-memory repository for tests/dev.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use domainforge_aggregate::Aggregate;
use domainforge_core::Record;
use domainforge_events::{DomainEvent, EventBus};

use crate::error::{RepositoryError, RepositoryResult};
use crate::repository::{Repository, identity_key, require_identity};

/// Records keyed by [`identity_key`], iterated in key order.
#[derive(Debug)]
pub struct InMemoryRepository<B> {
    records: RwLock<BTreeMap<String, Record>>,
    bus: B,
}

impl<B> InMemoryRepository<B> {
    pub fn new(bus: B) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B> InMemoryRepository<B>
where
    B: EventBus<DomainEvent>,
{
    fn publish_pending(&self, aggregate: &mut Aggregate) -> RepositoryResult<()> {
        for event in aggregate.pending_events() {
            self.bus
                .publish(event.clone())
                .map_err(|e| RepositoryError::Publish {
                    event_type: event.event_type().to_string(),
                    message: e.to_string(),
                })?;
        }

        let published = aggregate.pending_events().len();
        aggregate.clear_domain_events();
        if published > 0 {
            tracing::debug!(aggregate = aggregate.name(), published, "domain events published");
        }
        Ok(())
    }
}

impl<B> Repository for InMemoryRepository<B>
where
    B: EventBus<DomainEvent>,
{
    fn find_by_id(&self, id: &Value) -> RepositoryResult<Option<Record>> {
        let records = self.records.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(records.get(&identity_key(id)).cloned())
    }

    fn find_all(&self) -> RepositoryResult<Vec<Record>> {
        let records = self.records.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(records.values().cloned().collect())
    }

    fn save(&self, aggregate: &mut Aggregate) -> RepositoryResult<()> {
        let key = require_identity(aggregate)?;
        {
            let mut records = self.records.write().map_err(|_| RepositoryError::Poisoned)?;
            records.insert(key.clone(), aggregate.data().clone());
        }
        tracing::debug!(aggregate = aggregate.name(), id = %key, "aggregate saved");

        self.publish_pending(aggregate)
    }

    fn delete(&self, id: &Value) -> RepositoryResult<bool> {
        let mut records = self.records.write().map_err(|_| RepositoryError::Poisoned)?;
        Ok(records.remove(&identity_key(id)).is_some())
    }

    fn count(&self) -> RepositoryResult<usize> {
        let records = self.records.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use domainforge_aggregate::prelude::*;
    use domainforge_events::{InMemoryEventBus, Subscription};

    use super::*;
    use crate::repository::load;
    use crate::specification::{FieldEquals, SpecificationExt};

    fn tickets() -> AggregateFactory {
        AggregateFactory::builder("Ticket")
            .schema(
                ObjectSchema::new()
                    .field("id", FieldKind::string())
                    .field("status", FieldKind::one_of(["OPEN", "CLOSED"]))
                    .field("priority", FieldKind::integer().with_min(1).with_max(5)),
            )
            .identity("id")
            .methods(|factory| {
                let f = factory.clone();
                MethodSet::new().with("close", move |this: &Aggregate, _| {
                    let mut next = f.update(this, json!({"status": "CLOSED"}))?;
                    next.emit_event("TicketClosed", json!({"id": this.id()}))?;
                    Ok(next)
                })
            })
            .build()
            .unwrap()
    }

    fn open(factory: &AggregateFactory, id: &str, priority: i64) -> Aggregate {
        factory
            .create(json!({"id": id, "status": "OPEN", "priority": priority}))
            .unwrap()
    }

    /// Accepts the first `limit` events, then refuses everything.
    struct FlakyBus {
        limit: usize,
        seen: AtomicUsize,
        inner: InMemoryEventBus<DomainEvent>,
    }

    impl EventBus<DomainEvent> for FlakyBus {
        type Error = String;

        fn publish(&self, message: DomainEvent) -> Result<(), String> {
            if self.seen.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err("bus offline".to_string());
            }
            self.inner.publish(message).map_err(|e| e.to_string())
        }

        fn subscribe(&self) -> Subscription<DomainEvent> {
            self.inner.subscribe()
        }
    }

    #[test]
    fn save_stores_plain_data_and_publishes_then_clears_events() {
        let factory = tickets();
        let repo = InMemoryRepository::new(InMemoryEventBus::new());
        let sub = repo.bus().subscribe();

        let mut ticket = open(&factory, "t-1", 3).call("close", Value::Null).unwrap();
        ticket.emit_event("TicketArchived", json!({"reason": "done"})).unwrap();
        repo.save(&mut ticket).unwrap();

        assert!(!ticket.has_events());
        let published: Vec<String> = sub.drain().iter().map(|e| e.event_type().to_string()).collect();
        assert_eq!(published, vec!["TicketClosed", "TicketArchived"]);

        let stored = repo.find_by_id(&json!("t-1")).unwrap().unwrap();
        assert_eq!(&stored, ticket.data());
        assert_eq!(stored.str("status"), Some("CLOSED"));
    }

    #[test]
    fn failed_publication_keeps_events_pending() {
        let factory = tickets();
        let bus = FlakyBus {
            limit: 1,
            seen: AtomicUsize::new(0),
            inner: InMemoryEventBus::new(),
        };
        let repo = InMemoryRepository::new(bus);

        let mut ticket = open(&factory, "t-1", 1);
        ticket.emit_event("A", Value::Null).unwrap();
        ticket.emit_event("B", Value::Null).unwrap();

        let err = repo.save(&mut ticket).unwrap_err();
        assert!(matches!(err, RepositoryError::Publish { ref event_type, .. } if event_type == "B"));
        assert_eq!(ticket.pending_events().len(), 2);
    }

    #[test]
    fn lookups_use_the_identity_value() {
        let factory = tickets();
        let repo = Arc::new(InMemoryRepository::new(InMemoryEventBus::new()));
        let mut batch = vec![open(&factory, "b", 2), open(&factory, "a", 5), open(&factory, "c", 4)];
        repo.save_all(&mut batch).unwrap();

        assert_eq!(repo.count().unwrap(), 3);
        let ids: Vec<String> = repo.find_all().unwrap().iter().filter_map(|r| r.str("id").map(str::to_string)).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let found = repo.find_by_ids(&[json!("c"), json!("missing"), json!("a")]).unwrap();
        let found: Vec<_> = found.iter().filter_map(|r| r.str("id").map(str::to_string)).collect();
        assert_eq!(found, vec!["c", "a"]);

        assert!(repo.delete(&json!("b")).unwrap());
        assert!(!repo.delete(&json!("b")).unwrap());
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn specifications_filter_stored_records() {
        let factory = tickets();
        let repo = InMemoryRepository::new(InMemoryEventBus::new());
        let mut batch = vec![
            open(&factory, "a", 5),
            open(&factory, "b", 1),
            open(&factory, "c", 4).call("close", Value::Null).unwrap(),
        ];
        repo.save_all(&mut batch).unwrap();

        let urgent = |r: &Record| r.i64("priority").is_some_and(|p| p >= 4);
        let spec = FieldEquals::new("status", "OPEN").and(urgent);
        let hits = repo.find_by_specification(&spec).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].str("id"), Some("a"));
    }

    #[test]
    fn load_rehydrates_and_rejects_corrupt_records() {
        let factory = tickets();
        let repo = InMemoryRepository::new(InMemoryEventBus::new());
        let mut ticket = open(&factory, "t-9", 2);
        repo.save(&mut ticket).unwrap();

        let loaded = load(&repo, &factory, &json!("t-9")).unwrap().unwrap();
        assert_eq!(loaded, ticket);
        assert!(loaded.has_method("close"));
        assert!(load(&repo, &factory, &json!("nope")).unwrap().is_none());

        let stricter = factory
            .extend(ExtendOptions::new("UrgentTicket").inherit_methods().invariant(Invariant::new(
                "urgent priority",
                |s: &Record| s.i64("priority").is_some_and(|p| p >= 4),
            )))
            .unwrap();
        let err = load(&repo, &stricter, &json!("t-9")).unwrap_err();
        assert!(matches!(err, RepositoryError::Domain(DomainError::InvariantViolation(_))));
    }
}
