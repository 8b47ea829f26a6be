//! Inventory ledger: per-product stock reservations.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::domain::aggregates::StockReservation;
use crate::store::{StoreError, Transaction};

/// Remaining stock at or below this level is reported as low.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Error, Debug)]
pub enum StockError {
    #[error("product not found: {0}")]
    ProductNotFound(i64),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: i64, available: i32, requested: i32 },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self { Self }

    /// Takes `quantity` units of a product inside `tx`.
    ///
    /// The decrement is a single conditional write, so two transactions racing
    /// for the last units cannot both succeed. The reservation only becomes
    /// durable when `tx` commits.
    #[instrument(skip_all, fields(product_id = product_id, quantity = quantity))]
    pub async fn reserve(&self, tx: &mut dyn Transaction, product_id: i64, quantity: i32) -> Result<StockReservation, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        if tx.find_product(product_id).await?.is_none() {
            return Err(StockError::ProductNotFound(product_id));
        }
        match tx.decrement_stock(product_id, quantity).await? {
            Some(remaining) => {
                if remaining <= LOW_STOCK_THRESHOLD {
                    warn!(product_id, remaining, "low stock");
                } else {
                    debug!(product_id, remaining, "stock reserved");
                }
                Ok(StockReservation { product_id, quantity, remaining })
            }
            None => {
                // Re-read so the caller sees the stock that actually blocked the write.
                let available = tx.find_product(product_id).await?
                    .ok_or(StockError::ProductNotFound(product_id))?
                    .stock_quantity;
                Err(StockError::InsufficientStock { product_id, available, requested: quantity })
            }
        }
    }

    /// Returns `quantity` units to a product. Yields the new stock level.
    #[instrument(skip_all, fields(product_id = product_id, quantity = quantity))]
    pub async fn release(&self, tx: &mut dyn Transaction, product_id: i64, quantity: i32) -> Result<i32, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }
        let stock = tx.increment_stock(product_id, quantity).await?
            .ok_or(StockError::ProductNotFound(product_id))?;
        debug!(product_id, stock, "stock released");
        Ok(stock)
    }
}
