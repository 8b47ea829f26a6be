//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: i64,
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Percentage (0-100) or fixed amount, depending on `discount_type`.
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    /// Upper bound for percentage discounts.
    pub max_discount: Option<Decimal>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "PERCENTAGE", Self::Fixed => "FIXED" }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DiscountType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PERCENTAGE" => Ok(Self::Percentage),
            "FIXED" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

impl Coupon {
    pub fn percentage(id: i64, code: CouponCode, percent: Decimal) -> Self {
        Self::new(id, code, DiscountType::Percentage, percent)
    }

    pub fn fixed(id: i64, code: CouponCode, amount: Decimal) -> Self {
        Self::new(id, code, DiscountType::Fixed, amount)
    }

    fn new(id: i64, code: CouponCode, discount_type: DiscountType, discount_value: Decimal) -> Self {
        Self {
            id, code, discount_type, discount_value,
            min_order_amount: None, max_discount: None, expiry_date: None,
            usage_limit: None, used_count: 0, is_active: true,
        }
    }

    pub fn with_min_order(mut self, amount: Decimal) -> Self { self.min_order_amount = Some(amount); self }
    pub fn with_max_discount(mut self, amount: Decimal) -> Self { self.max_discount = Some(amount); self }
    pub fn with_usage_limit(mut self, limit: i32) -> Self { self.usage_limit = Some(limit); self }
    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self { self.expiry_date = Some(at); self }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map_or(false, |expiry| now > expiry)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.map_or(false, |limit| self.used_count >= limit)
    }

    /// active, not expired and below its usage limit
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now) && !self.is_exhausted()
    }

    pub fn meets_minimum(&self, order_total: Decimal) -> bool {
        self.min_order_amount.map_or(true, |min| order_total >= min)
    }

    /// Discount for `order_total`, rounded to cents. Never exceeds the total and
    /// is zero below the minimum.
    pub fn calculate_discount(&self, order_total: Decimal) -> Decimal {
        if order_total <= Decimal::ZERO || !self.meets_minimum(order_total) {
            return Decimal::ZERO;
        }
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                // An overflowing product is far above any total; the clamp below applies.
                let raw = order_total.checked_mul(self.discount_value)
                    .map_or(order_total, |v| v / Decimal::ONE_HUNDRED);
                self.max_discount.map_or(raw, |cap| raw.min(cap))
            }
            DiscountType::Fixed => self.discount_value,
        };
        discount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .max(Decimal::ZERO)
            .min(order_total)
    }

    pub fn record_redemption(&mut self) { self.used_count += 1; }
}
