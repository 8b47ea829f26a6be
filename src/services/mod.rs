//! Application services.
//!
//! Every service works on a [`Transaction`](crate::store::Transaction) it is
//! handed, except the orchestrators ([`OrderService`], [`CartService`]) which
//! own transaction demarcation.

pub mod assembler;
pub mod cart;
pub mod coupons;
pub mod inventory;
pub mod orders;

pub use assembler::{OrderAssembler, OrderLineRequest, OrderRequest, ValidatedOrder};
pub use cart::{CartError, CartService};
pub use coupons::{AppliedCoupon, CouponError, CouponGuard};
pub use inventory::{InventoryLedger, StockError, LOW_STOCK_THRESHOLD};
pub use orders::OrderService;
