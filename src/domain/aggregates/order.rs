//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CouponCode, TrackingNumber};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    /// Amount charged, after the coupon discount.
    pub total_amount: Decimal,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub coupon_code: Option<String>,
    pub discount_amount: Option<Decimal>,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub items: Vec<OrderItem>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Line item with name and price snapshotted at order time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem { pub id: i64, pub product_id: i64, pub product_name: String, pub price: Decimal, pub quantity: i32 }

impl OrderItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub shipping_address: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
    /// Landmark or free-form location hint.
    pub location: Option<String>,
}

impl ShippingDetails {
    /// "street, city, state - pincode, country", skipping blank parts.
    pub fn delivery_address(&self) -> Option<String> {
        let mut out = String::new();
        let mut push = |sep: &str, part: &Option<String>| {
            if let Some(part) = part.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                if !out.is_empty() { out.push_str(sep); }
                out.push_str(part);
            }
        };
        push(", ", &self.street);
        push(", ", &self.city);
        push(", ", &self.state);
        push(" - ", &self.pincode);
        push(", ", &self.country);
        if out.is_empty() { None } else { Some(out) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING", Self::Confirmed => "CONFIRMED", Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED", Self::Delivered => "DELIVERED", Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0), Self::Confirmed => Some(1), Self::Processing => Some(2),
            Self::Shipped => Some(3), Self::Delivered => Some(4), Self::Cancelled => None,
        }
    }

    /// Staying put is always allowed. Otherwise: forward along the fulfilment chain,
    /// or into `Cancelled` from any non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next { return true; }
        if self.is_terminal() { return false; }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending), "CONFIRMED" => Ok(Self::Confirmed),
            "PROCESSING" => Ok(Self::Processing), "SHIPPED" => Ok(Self::Shipped),
            "DELIVERED" => Ok(Self::Delivered), "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Outcome of [`Order::apply_status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange { pub from: OrderStatus, pub to: OrderStatus }

impl StatusChange {
    pub fn changed(&self) -> bool { self.from != self.to }
    pub fn is_cancellation(&self) -> bool { self.changed() && self.to == OrderStatus::Cancelled }
}

impl Order {
    /// Rebuilds a persisted order. Carries no pending events.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: i64, customer_id: i64, total_amount: Decimal, order_date: DateTime<Utc>, status: OrderStatus,
        tracking_number: Option<String>, coupon_code: Option<String>, discount_amount: Option<Decimal>,
        shipping: ShippingDetails, items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id, customer_id, total_amount, order_date, status, tracking_number, coupon_code,
            discount_amount, shipping, items, events: vec![],
        }
    }

    pub fn subtotal(&self) -> Decimal { self.items.iter().map(OrderItem::line_total).sum() }

    /// Records that this order has just been committed.
    pub fn record_placed(&mut self) {
        self.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: self.id, customer_id: self.customer_id, total: self.total_amount,
        }));
    }

    /// Moves the order to `next`. Entering `Shipped` assigns a tracking number once.
    /// A `StatusChanged` event is raised only when the status really changes.
    pub fn apply_status(&mut self, next: OrderStatus) -> Result<StatusChange, OrderStateError> {
        let from = self.status;
        if !from.can_transition_to(next) {
            return Err(OrderStateError::InvalidTransition { from, to: next });
        }
        self.status = next;
        if next == OrderStatus::Shipped && self.tracking_number.is_none() {
            self.tracking_number = Some(TrackingNumber::for_order(self.id).into_inner());
        }
        let change = StatusChange { from, to: next };
        if change.changed() {
            self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        }
        Ok(change)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// An assembled order that has not been persisted yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub customer_id: i64,
    pub subtotal: Decimal,
    pub discount_amount: Option<Decimal>,
    pub total_amount: Decimal,
    pub coupon_code: Option<CouponCode>,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub shipping: ShippingDetails,
    pub items: Vec<NewOrderItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOrderItem { pub product_id: i64, pub product_name: String, pub price: Decimal, pub quantity: i32 }

impl NewOrder {
    /// Attaches store-assigned identities.
    pub fn into_order(self, id: i64, item_ids: &[i64]) -> Order {
        let items = self.items.into_iter().zip(item_ids.iter().copied())
            .map(|(item, item_id)| OrderItem {
                id: item_id, product_id: item.product_id, product_name: item.product_name,
                price: item.price, quantity: item.quantity,
            })
            .collect();
        Order::restore(
            id, self.customer_id, self.total_amount, self.order_date, self.status, None,
            self.coupon_code.map(String::from), self.discount_amount, self.shipping, items,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderStateError {
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: i64) -> Order {
        let item = OrderItem { id: 1, product_id: 7, product_name: "Jute Bag".into(), price: Decimal::new(250, 0), quantity: 2 };
        Order::restore(id, 3, Decimal::new(500, 0), Utc::now(), OrderStatus::Pending, None, None, None, ShippingDetails::default(), vec![item])
    }

    #[test]
    fn test_order_workflow() {
        let mut o = order(12);
        assert_eq!(o.subtotal(), Decimal::new(500, 0));
        o.apply_status(OrderStatus::Confirmed).unwrap();
        o.apply_status(OrderStatus::Processing).unwrap();
        o.apply_status(OrderStatus::Shipped).unwrap();
        assert_eq!(o.tracking_number.as_deref(), Some("TRK00000012"));
        o.apply_status(OrderStatus::Delivered).unwrap();
        assert_eq!(o.take_events().len(), 4);
        assert!(o.apply_status(OrderStatus::Cancelled).is_err());
    }

    #[test]
    fn test_tracking_number_assigned_once() {
        let mut o = order(5);
        o.tracking_number = Some("CARRIER-XYZ".into());
        o.apply_status(OrderStatus::Shipped).unwrap();
        let change = o.apply_status(OrderStatus::Shipped).unwrap();
        assert!(!change.changed());
        assert_eq!(o.tracking_number.as_deref(), Some("CARRIER-XYZ"));
        assert_eq!(o.take_events().len(), 1);
    }

    #[test]
    fn test_cancel_rules() {
        let mut o = order(1);
        o.apply_status(OrderStatus::Processing).unwrap();
        assert!(o.apply_status(OrderStatus::Confirmed).is_err());
        assert!(o.apply_status(OrderStatus::Cancelled).unwrap().is_cancellation());
        assert_eq!(
            o.apply_status(OrderStatus::Pending),
            Err(OrderStateError::InvalidTransition { from: OrderStatus::Cancelled, to: OrderStatus::Pending })
        );
    }

    #[test]
    fn test_delivery_address() {
        let s = ShippingDetails {
            street: Some("12 Park Rd".into()), city: Some("Pune".into()), state: Some(" ".into()),
            pincode: Some("411001".into()), country: Some("India".into()), ..Default::default()
        };
        assert_eq!(s.delivery_address().as_deref(), Some("12 Park Rd, Pune - 411001, India"));
        assert_eq!(ShippingDetails::default().delivery_address(), None);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("LOST".parse::<OrderStatus>().is_err());
    }
}
