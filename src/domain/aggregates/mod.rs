//! Aggregates module
pub mod product;
pub mod coupon;
pub mod order;
pub mod cart;

pub use product::{Product, StockReservation};
pub use coupon::{Coupon, DiscountType};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStateError, OrderStatus, ShippingDetails, StatusChange};
pub use cart::CartLine;
