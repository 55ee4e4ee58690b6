use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use domainforge_aggregate::{Aggregate, AggregateFactory, MethodSet};
use domainforge_core::{DomainError, DomainResult, EmailAddress, FieldKind, Invariant, ObjectSchema, Record};
use domainforge_events::{DomainEvent, Event, TypedEventFactory};

pub const ITEMS_WHEN_PLACED: &str = "Order must have at least one item when placed";
pub const UNIQUE_SKUS: &str = "Order items must have unique skus";

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Draft,
    Placed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [OrderStatus::Draft, OrderStatus::Placed, OrderStatus::Cancelled];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Placed => "PLACED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line: sku, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: i64,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price)
    }
}

/// Typed read view over an order's validated data.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderView {
    pub id: Uuid,
    pub customer: EmailAddress,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

impl OrderView {
    pub fn of(order: &Aggregate) -> DomainResult<Self> {
        order.data().to_typed()
    }

    pub fn total(&self) -> i64 {
        self.items.iter().map(OrderItem::line_total).fold(0, i64::saturating_add)
    }
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: Uuid,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: i64,
}

impl Event for ItemAdded {
    fn event_type(&self) -> &'static str {
        "sales.order.item_added"
    }
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: Uuid,
    pub item_count: usize,
    pub total: i64,
    pub placed_at: DateTime<Utc>,
}

impl Event for OrderPlaced {
    fn event_type(&self) -> &'static str {
        "sales.order.placed"
    }

    fn occurred_at(&self) -> Option<DateTime<Utc>> {
        Some(self.placed_at)
    }
}

/// Event: OrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Event for OrderCancelled {
    fn event_type(&self) -> &'static str {
        "sales.order.cancelled"
    }
}

fn item_schema() -> ObjectSchema {
    ObjectSchema::new()
        .field("sku", FieldKind::string().with_min(1))
        .field("quantity", FieldKind::integer().with_min(1))
        .field("unit_price", FieldKind::integer().with_min(0))
}

pub fn order_schema() -> ObjectSchema {
    ObjectSchema::new()
        .field("id", FieldKind::uuid())
        .field("customer", FieldKind::value_object::<EmailAddress>())
        .with_default(
            "status",
            FieldKind::one_of(OrderStatus::ALL.map(OrderStatus::as_str)),
            OrderStatus::Draft.as_str(),
        )
        .with_default("items", FieldKind::array(FieldKind::object(item_schema())), json!([]))
}

fn items_when_placed() -> Invariant {
    Invariant::new(ITEMS_WHEN_PLACED, |s: &Record| {
        s.str("status") != Some(OrderStatus::Placed.as_str())
            || s.array("items").is_some_and(|items| !items.is_empty())
    })
}

fn unique_skus() -> Invariant {
    Invariant::new(UNIQUE_SKUS, |s: &Record| {
        let skus: Vec<&str> = s
            .array("items")
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("sku")?.as_str())
            .collect();
        skus.iter().collect::<BTreeSet<_>>().len() == skus.len()
    })
}

/// The `Order` aggregate factory.
///
/// Methods: `addItem({sku, quantity, unit_price})`, `placeOrder()`, `cancel({reason?})`.
pub fn orders() -> DomainResult<AggregateFactory> {
    AggregateFactory::builder("Order")
        .schema(order_schema())
        .identity("id")
        .invariants([items_when_placed(), unique_skus()])
        .historize(true)
        .methods(order_methods)
        .build()
}

/// Start a draft order for `customer` with a fresh v7 id.
pub fn new_order(factory: &AggregateFactory, customer: &str) -> DomainResult<Aggregate> {
    factory.create(json!({"id": Uuid::now_v7(), "customer": customer}))
}

fn order_methods(factory: &AggregateFactory) -> MethodSet {
    let add = factory.clone();
    let place = factory.clone();
    let cancel = factory.clone();
    MethodSet::new()
        .with("addItem", move |order, args| add_item(&add, order, args))
        .with("placeOrder", move |order, _| place_order(&place, order))
        .with("cancel", move |order, args| cancel_order(&cancel, order, args))
}

fn status_of(order: &Aggregate) -> DomainResult<OrderStatus> {
    order
        .get_as("status")
        .ok_or_else(|| DomainError::domain("order has no status"))
}

fn order_id(order: &Aggregate) -> DomainResult<Uuid> {
    order
        .get_as("id")
        .ok_or_else(|| DomainError::domain("order has no id"))
}

fn ensure_draft(order: &Aggregate, action: &str) -> DomainResult<()> {
    match status_of(order)? {
        OrderStatus::Draft => Ok(()),
        other => {
            tracing::debug!(order = %order, status = %other, action, "order is not a draft");
            Err(DomainError::domain(format!("cannot {action} an order that is {other}")))
        }
    }
}

fn add_item(factory: &AggregateFactory, order: &Aggregate, item: Value) -> DomainResult<Aggregate> {
    ensure_draft(order, "add items to")?;

    let mut items = order.data().array("items").cloned().unwrap_or_default();
    items.push(item);
    let mut next = factory.update(order, json!({ "items": items }))?;

    let added = next
        .get_as::<Vec<OrderItem>>("items")
        .and_then(|mut items| items.pop())
        .ok_or_else(|| DomainError::domain("added item missing from order"))?;
    let event = DomainEvent::from_typed(&ItemAdded {
        order_id: order_id(&next)?,
        sku: added.sku,
        quantity: added.quantity,
        unit_price: added.unit_price,
    })?;
    next.record_event(event);
    Ok(next)
}

fn place_order(factory: &AggregateFactory, order: &Aggregate) -> DomainResult<Aggregate> {
    ensure_draft(order, "place")?;

    let mut next = factory.update(order, json!({ "status": OrderStatus::Placed }))?;
    let view = OrderView::of(&next)?;
    next.emit_event(
        &TypedEventFactory::<OrderPlaced>::new(),
        json!({
            "order_id": view.id,
            "item_count": view.items.len(),
            "total": view.total(),
            "placed_at": Utc::now(),
        }),
    )?;
    tracing::debug!(order = %next, items = view.items.len(), total = view.total(), "order placed");
    Ok(next)
}

fn cancel_order(factory: &AggregateFactory, order: &Aggregate, args: Value) -> DomainResult<Aggregate> {
    if status_of(order)? == OrderStatus::Cancelled {
        tracing::debug!(order = %order, "order is already cancelled");
        return Err(DomainError::domain("order is already cancelled"));
    }
    let reason = args.get("reason").and_then(Value::as_str).map(str::to_string);

    let mut next = factory.update(order, json!({ "status": OrderStatus::Cancelled }))?;
    let event = DomainEvent::from_typed(&OrderCancelled {
        order_id: order_id(&next)?,
        reason,
    })?;
    next.record_event(event);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domainforge_aggregate::AggregateExt;
    use domainforge_events::{EventBus, InMemoryEventBus};
    use domainforge_repository::{InMemoryRepository, Repository};

    fn item(sku: &str, quantity: i64, unit_price: i64) -> Value {
        json!({"sku": sku, "quantity": quantity, "unit_price": unit_price})
    }

    fn draft() -> Aggregate {
        new_order(&orders().unwrap(), "buyer@example.com").unwrap()
    }

    #[test]
    fn placed_order_without_items_is_rejected_on_create() {
        let factory = orders().unwrap();
        let err = factory
            .create(json!({
                "id": Uuid::now_v7(),
                "customer": "buyer@example.com",
                "status": "PLACED",
                "items": [],
            }))
            .unwrap_err();
        assert_eq!(err.invariant_name(), Some(ITEMS_WHEN_PLACED));
    }

    #[test]
    fn draft_order_without_items_is_accepted() {
        let factory = orders().unwrap();
        let order = factory
            .create(json!({
                "id": Uuid::now_v7(),
                "customer": "buyer@example.com",
                "status": "DRAFT",
                "items": [],
            }))
            .unwrap();
        assert_eq!(status_of(&order).unwrap(), OrderStatus::Draft);
    }

    #[test]
    fn placing_an_empty_draft_fails_with_the_same_invariant() {
        let order = draft();
        let err = order.call("placeOrder", Value::Null).unwrap_err();
        assert_eq!(err.invariant_name(), Some(ITEMS_WHEN_PLACED));
        assert_eq!(status_of(&order).unwrap(), OrderStatus::Draft);
        assert!(!order.has_events());
    }

    #[test]
    fn defaults_and_normalisation_are_applied() {
        let order = draft();
        let view = OrderView::of(&order).unwrap();
        assert_eq!(view.status, OrderStatus::Draft);
        assert!(view.items.is_empty());

        let shouty = orders()
            .unwrap()
            .create(json!({"id": Uuid::now_v7(), "customer": " Buyer@Example.COM "}))
            .unwrap();
        assert_eq!(shouty.data().str("customer"), Some("buyer@example.com"));
    }

    #[test]
    fn add_item_validates_the_item_through_the_schema() {
        let order = draft();
        let err = order.call("addItem", item("ABC", 0, 100)).unwrap_err();
        match err {
            DomainError::Validation(v) => assert!(v.has_path("items[0].quantity")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(order.data().array("items").is_some_and(Vec::is_empty));
    }

    #[test]
    fn duplicate_skus_are_rejected() {
        let order = draft().call("addItem", item("ABC", 1, 100)).unwrap();
        let err = order.call("addItem", item("ABC", 2, 100)).unwrap_err();
        assert_eq!(err.invariant_name(), Some(UNIQUE_SKUS));
    }

    #[test]
    fn full_lifecycle_draft_to_placed() {
        let order = draft()
            .call("addItem", item("ABC", 2, 150))
            .unwrap()
            .call("addItem", item("XYZ", 1, 700))
            .unwrap()
            .call("placeOrder", Value::Null)
            .unwrap();

        let view = OrderView::of(&order).unwrap();
        assert_eq!(view.status, OrderStatus::Placed);
        assert_eq!(view.total(), 1000);

        let types: Vec<&str> = order.pending_events().iter().map(DomainEvent::event_type).collect();
        assert_eq!(
            types,
            vec!["sales.order.item_added", "sales.order.item_added", "sales.order.placed"]
        );

        let placed: OrderPlaced = order.pending_events()[2].to_typed().unwrap();
        assert_eq!(placed.order_id, view.id);
        assert_eq!(placed.item_count, 2);
        assert_eq!(placed.total, 1000);
        assert_eq!(order.pending_events()[2].timestamp(), placed.placed_at);

        let history = order.history().unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[2].change_for("status").is_some());
    }

    #[test]
    fn cannot_modify_placed_order() {
        let order = draft()
            .call("addItem", item("ABC", 1, 100))
            .unwrap()
            .call("placeOrder", Value::Null)
            .unwrap();

        let err = order.call("addItem", item("XYZ", 1, 100)).unwrap_err();
        assert!(matches!(err, DomainError::Domain(ref msg) if msg.contains("PLACED")));
        assert!(matches!(order.call("placeOrder", Value::Null), Err(DomainError::Domain(_))));
    }

    #[test]
    fn cancel_records_the_reason_once() {
        let order = draft().call("cancel", json!({"reason": "changed mind"})).unwrap();
        let cancelled: OrderCancelled = order.pending_events()[0].to_typed().unwrap();
        assert_eq!(cancelled.reason.as_deref(), Some("changed mind"));

        assert!(matches!(order.call("cancel", Value::Null), Err(DomainError::Domain(_))));
    }

    #[test]
    fn identity_cannot_be_reassigned() {
        let factory = orders().unwrap();
        let order = draft();
        let err = factory.update(&order, json!({"id": Uuid::now_v7()})).unwrap_err();
        assert!(err.is_identity_change());
    }

    #[test]
    fn saving_publishes_order_events() {
        let factory = orders().unwrap();
        let repo = InMemoryRepository::new(InMemoryEventBus::new());
        let sub = repo.bus().subscribe();

        let mut order = new_order(&factory, "buyer@example.com")
            .unwrap()
            .call("addItem", item("ABC", 3, 10))
            .unwrap()
            .call("placeOrder", Value::Null)
            .unwrap();
        repo.save(&mut order).unwrap();

        assert!(!order.has_events());
        assert_eq!(sub.drain().len(), 2);

        let id = order.id().cloned().unwrap();
        let stored = repo.find_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.str("status"), Some("PLACED"));
    }
}
