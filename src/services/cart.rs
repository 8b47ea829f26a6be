//! Cart lines with stock conflict handling.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::domain::aggregates::CartLine;
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum CartError {
    #[error("product not found: {0}")]
    ProductNotFound(i64),

    #[error("not enough stock for product {product_id}: only {available} available")]
    NotEnoughStock { product_id: i64, available: i32, requested: i32 },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Adds units to the customer's line for a product, merging with any existing
    /// line. The merged quantity may not exceed current stock.
    #[instrument(skip(self))]
    pub async fn add_item(&self, customer_id: i64, product_id: i64, quantity: i32) -> Result<CartLine, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let mut tx = self.store.begin().await?;
        let product = tx.find_product(product_id).await?.ok_or(CartError::ProductNotFound(product_id))?;
        let existing = tx.find_cart_line(customer_id, product_id).await?;
        let requested = CartLine::merged_quantity(existing.as_ref(), quantity);
        if requested > product.stock_quantity {
            info!(customer_id, product_id, requested, available = product.stock_quantity, "cart add rejected");
            return Err(CartError::NotEnoughStock { product_id, available: product.stock_quantity, requested });
        }
        let line = tx.upsert_cart_line(customer_id, product_id, requested).await?;
        tx.commit().await?;
        debug!(line_id = line.id, quantity = line.quantity, "cart line saved");
        Ok(line)
    }

    pub async fn lines(&self, customer_id: i64) -> Result<Vec<CartLine>, CartError> {
        let mut tx = self.store.begin().await?;
        let lines = tx.cart_lines(customer_id).await?;
        tx.rollback().await?;
        Ok(lines)
    }

    /// Removes one unit; the line disappears when its last unit goes.
    /// Returns the remaining line, if any.
    #[instrument(skip(self))]
    pub async fn decrement_item(&self, customer_id: i64, product_id: i64) -> Result<Option<CartLine>, CartError> {
        let mut tx = self.store.begin().await?;
        let Some(line) = tx.find_cart_line(customer_id, product_id).await? else {
            return Ok(None);
        };
        let remaining = if line.is_last_unit() {
            tx.delete_cart_line(line.id).await?;
            None
        } else {
            Some(tx.upsert_cart_line(customer_id, product_id, line.quantity - 1).await?)
        };
        tx.commit().await?;
        Ok(remaining)
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: i64) -> Result<u64, CartError> {
        let mut tx = self.store.begin().await?;
        let removed = tx.clear_cart(customer_id).await?;
        tx.commit().await?;
        Ok(removed)
    }
}
