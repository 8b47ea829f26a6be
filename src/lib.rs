//! GreenCart order core
//!
//! Order placement and inventory reservation for a self-hosted storefront.
//!
//! ## Features
//! - All-or-nothing order placement (coupon, stock, order rows, cart cleanup)
//! - Conditional stock reservation that never oversells
//! - Coupon redemption guarded against double-spend
//! - Checked order status workflow with tracking numbers
//! - Best-effort notifications dispatched after commit

pub mod api;
pub mod config;
pub mod domain;
pub mod notifications;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{OrderStateError, OrderStatus};
use crate::services::assembler::AssemblyError;
use crate::services::coupons::CouponError;
use crate::services::inventory::StockError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

/// Rejections surfaced by the order workflow.
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("invalid order request: {0}")]
    InvalidOrderRequest(String),

    #[error(transparent)]
    Coupon(CouponError),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: i64, available: i32, requested: i32 },

    #[error("product not found: {0}")]
    ProductNotFound(i64),

    #[error("order not found: {0}")]
    OrderNotFound(i64),

    #[error("cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("order placement failed: {0}")]
    OrderPlacementFailed(StoreError),

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl OrderError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOrderRequest(_) => "INVALID_ORDER_REQUEST",
            Self::Coupon(e) => e.code(),
            Self::Storage(_) => "STORAGE_ERROR",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::OrderPlacementFailed(_) => "ORDER_PLACEMENT_FAILED",
        }
    }

    /// Business-rule rejections, as opposed to persistence faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::OrderPlacementFailed(_) | Self::Storage(_))
    }

    /// Storage faults raised while placing an order are reported as a
    /// placement failure, which callers may retry by resubmitting.
    pub(crate) fn during_placement(self) -> Self {
        match self {
            Self::Storage(e) => Self::OrderPlacementFailed(e),
            other => other,
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self { Self::Storage(e) }
}

impl From<StockError> for OrderError {
    fn from(e: StockError) -> Self {
        match e {
            StockError::ProductNotFound(id) => Self::ProductNotFound(id),
            StockError::InsufficientStock { product_id, available, requested } => {
                Self::InsufficientStock { product_id, available, requested }
            }
            StockError::InvalidQuantity(q) => Self::InvalidOrderRequest(format!("invalid quantity: {q}")),
            StockError::Store(e) => Self::Storage(e),
        }
    }
}

impl From<CouponError> for OrderError {
    fn from(e: CouponError) -> Self {
        match e {
            CouponError::Store(e) => Self::Storage(e),
            other => Self::Coupon(other),
        }
    }
}

impl From<AssemblyError> for OrderError {
    fn from(e: AssemblyError) -> Self {
        match e {
            AssemblyError::EmptyOrder => Self::InvalidOrderRequest("order has no items".into()),
            AssemblyError::Invalid(msg) => Self::InvalidOrderRequest(msg),
        }
    }
}

impl From<OrderStateError> for OrderError {
    fn from(e: OrderStateError) -> Self {
        match e {
            OrderStateError::InvalidTransition { from, to } => Self::InvalidStatusTransition { from, to },
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
