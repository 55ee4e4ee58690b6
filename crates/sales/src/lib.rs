//! Sales orders domain module.
//!
//! Business rules for sales orders, expressed as aggregate definitions on the
//! domainforge engine (no IO, no storage).

pub mod order;
pub mod priority;

pub use order::{
    ItemAdded, ITEMS_WHEN_PLACED, OrderCancelled, OrderItem, OrderPlaced, OrderStatus, OrderView, UNIQUE_SKUS,
    new_order, orders,
};
pub use priority::{EXPEDITE_FEE_WHEN_URGENT, OrderEscalated, priority_orders};
