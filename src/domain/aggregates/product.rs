//! Product Aggregate
//!
//! Only `stock_quantity` is mutated by order placement, and only through the
//! conditional decrement exposed by the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: i32,
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, price: Decimal, stock_quantity: i32) -> Self {
        Self { id, name: name.into(), price, stock_quantity: stock_quantity.max(0) }
    }

    pub fn is_in_stock(&self) -> bool { self.stock_quantity > 0 }
    pub fn has_stock_for(&self, quantity: i32) -> bool { quantity > 0 && self.stock_quantity >= quantity }

    /// Applies a reservation to this in-memory copy. Returns the remaining stock,
    /// or `None` when the quantity cannot be covered.
    pub fn take_stock(&mut self, quantity: i32) -> Option<i32> {
        if !self.has_stock_for(quantity) { return None; }
        self.stock_quantity -= quantity;
        Some(self.stock_quantity)
    }

    pub fn return_stock(&mut self, quantity: i32) -> i32 {
        self.stock_quantity = self.stock_quantity.saturating_add(quantity.max(0));
        self.stock_quantity
    }
}

/// A stock decrement committed (within the enclosing transaction) for one order line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockReservation {
    pub product_id: i64,
    pub quantity: i32,
    pub remaining: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_take_stock() {
        let mut p = Product::new(1, "Bamboo Toothbrush", Decimal::new(199, 2), 5);
        assert_eq!(p.take_stock(3), Some(2));
        assert_eq!(p.take_stock(3), None);
        assert_eq!(p.stock_quantity, 2);
        assert!(p.is_in_stock());
    }
    #[test]
    fn test_non_positive_quantity_never_reserves() {
        let mut p = Product::new(1, "P", Decimal::ONE, 5);
        assert_eq!(p.take_stock(0), None);
        assert_eq!(p.take_stock(-2), None);
        assert_eq!(p.return_stock(4), 9);
    }
}
