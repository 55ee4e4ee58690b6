//! Priority orders: `Order` extended with an urgency level and an expedite fee.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use domainforge_aggregate::{Aggregate, AggregateFactory, ExtendOptions};
use domainforge_core::{DomainError, DomainResult, FieldKind, Invariant, ObjectSchema, Record};
use domainforge_events::{DomainEvent, Event};

pub const EXPEDITE_FEE_WHEN_URGENT: &str = "Priority 1 orders must carry an expedite fee";

/// Most urgent level.
pub const TOP_PRIORITY: i64 = 1;
const LOWEST_PRIORITY: i64 = 3;

/// Event: OrderEscalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEscalated {
    pub order_id: Uuid,
    pub priority: i64,
    pub expedite_fee: i64,
}

impl Event for OrderEscalated {
    fn event_type(&self) -> &'static str {
        "sales.order.escalated"
    }
}

fn expedite_fee_when_urgent() -> Invariant {
    Invariant::new(EXPEDITE_FEE_WHEN_URGENT, |s: &Record| {
        s.i64("priority") != Some(TOP_PRIORITY) || s.i64("expedite_fee").is_some_and(|fee| fee > 0)
    })
}

/// Derive `PriorityOrder` from the `Order` factory.
///
/// Keeps every order method and rule (checked first) and adds
/// `escalate({expedite_fee?})`, which raises urgency by one level.
pub fn priority_orders(orders: &AggregateFactory) -> DomainResult<AggregateFactory> {
    orders.extend(
        ExtendOptions::new("PriorityOrder")
            .schema(|base| {
                ObjectSchema::extending(base)
                    .with_default(
                        "priority",
                        FieldKind::integer().with_min(TOP_PRIORITY).with_max(LOWEST_PRIORITY),
                        LOWEST_PRIORITY,
                    )
                    .with_default("expedite_fee", FieldKind::integer().with_min(0), 0)
                    .into_ref()
            })
            .invariant(expedite_fee_when_urgent())
            .methods(|factory, inherited| {
                let f = factory.clone();
                inherited.with("escalate", move |order, args| escalate(&f, order, args))
            }),
    )
}

fn escalate(factory: &AggregateFactory, order: &Aggregate, args: Value) -> DomainResult<Aggregate> {
    let priority = order.data().i64("priority").unwrap_or(LOWEST_PRIORITY);
    if priority <= TOP_PRIORITY {
        tracing::debug!(order = %order, priority, "order is already at top priority");
        return Err(DomainError::domain("order is already at top priority"));
    }
    let fee = args
        .get("expedite_fee")
        .and_then(Value::as_i64)
        .or_else(|| order.data().i64("expedite_fee"))
        .unwrap_or(0);

    let mut next = factory.update(order, json!({"priority": priority - 1, "expedite_fee": fee}))?;
    let order_id = next
        .get_as::<Uuid>("id")
        .ok_or_else(|| DomainError::domain("order has no id"))?;
    let event = DomainEvent::from_typed(&OrderEscalated {
        order_id,
        priority: priority - 1,
        expedite_fee: fee,
    })?;
    next.record_event(event);
    Ok(next)
}
