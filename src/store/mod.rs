//! Transactional data access.
//!
//! The order workflow never talks to a database directly. It opens a
//! [`Transaction`] through a [`Store`], performs every read and write of one
//! business operation on it, and finishes with an explicit `commit` or
//! `rollback`. Dropping a transaction without committing discards its writes.
//!
//! Shared counters (`products.stock_quantity`, `coupons.used_count`) are only
//! changed through the conditional single-statement primitives
//! [`Transaction::decrement_stock`] and [`Transaction::redeem_coupon`], which is
//! what serializes concurrent orders against the same product or coupon.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{CartLine, Coupon, NewOrder, Order, OrderStatus, Product};
use crate::domain::value_objects::CouponCode;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Entry point to the persistence collaborator.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction spanning several entity writes.
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<Order>>;

    /// Orders of one customer, newest first.
    async fn orders_for_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>>;
}

/// One open unit of work. Every method runs inside the same transaction.
#[async_trait]
pub trait Transaction: Send {
    async fn find_product(&mut self, product_id: i64) -> StoreResult<Option<Product>>;

    /// `stock = stock - quantity WHERE stock >= quantity`. Returns the remaining
    /// stock, or `None` if no row matched (unknown product or not enough stock).
    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>>;

    /// Puts units back. Returns the new stock, or `None` for an unknown product.
    async fn increment_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>>;

    async fn find_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<Coupon>>;

    /// `used_count = used_count + 1` guarded by activity and the usage limit.
    /// Returns the new count, or `None` when the guard rejected the increment.
    async fn redeem_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<i32>>;

    /// Writes the order header and its items as one unit.
    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order>;

    /// Loads an order and locks it for the rest of the transaction.
    async fn find_order_for_update(&mut self, order_id: i64) -> StoreResult<Option<Order>>;

    async fn update_order_status(&mut self, order_id: i64, status: OrderStatus, tracking_number: Option<&str>) -> StoreResult<()>;

    async fn cart_lines(&mut self, customer_id: i64) -> StoreResult<Vec<CartLine>>;

    async fn find_cart_line(&mut self, customer_id: i64, product_id: i64) -> StoreResult<Option<CartLine>>;

    /// Inserts the line or overwrites the quantity of the existing one.
    async fn upsert_cart_line(&mut self, customer_id: i64, product_id: i64, quantity: i32) -> StoreResult<CartLine>;

    async fn delete_cart_line(&mut self, line_id: i64) -> StoreResult<()>;

    /// Removes every cart line of a customer, returning how many were deleted.
    async fn clear_cart(&mut self, customer_id: i64) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Addressing data for notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerContact {
    pub email: Option<String>,
    pub name: String,
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn get_customer_by_id(&self, customer_id: i64) -> StoreResult<Option<CustomerContact>>;
}
