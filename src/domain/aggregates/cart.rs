//! Cart lines
//!
//! One line per (customer, product). Adding a product that is already in the cart
//! merges into the existing line.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

impl CartLine {
    /// Quantity the line would hold after adding `extra` units to `existing`.
    pub fn merged_quantity(existing: Option<&CartLine>, extra: i32) -> i32 {
        existing.map_or(0, |line| line.quantity).saturating_add(extra)
    }

    pub fn is_last_unit(&self) -> bool { self.quantity <= 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_merge() {
        let line = CartLine { id: 1, customer_id: 9, product_id: 4, quantity: 2 };
        assert_eq!(CartLine::merged_quantity(Some(&line), 3), 5);
        assert_eq!(CartLine::merged_quantity(None, 3), 3);
        assert!(!line.is_last_unit());
    }
}
