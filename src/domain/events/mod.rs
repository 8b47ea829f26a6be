//! Domain events
//!
//! Raised by aggregates while a transaction is open and drained with `take_events()`
//! once it has committed.
use crate::domain::aggregates::OrderStatus;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: i64, customer_id: i64, total: Decimal },
    StatusChanged { order_id: i64, from: OrderStatus, to: OrderStatus },
}
