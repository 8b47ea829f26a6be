//! Order assembly: request validation and construction of the order aggregate.
//!
//! Nothing here touches the store. The assembler consumes the outcome of the
//! coupon redemption and produces a [`NewOrder`] ready to be persisted.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::{NewOrder, NewOrderItem, OrderStatus, ShippingDetails};
use crate::services::coupons::AppliedCoupon;

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct OrderRequest {
    #[validate(required(message = "customer id is required"))]
    pub customer_id: Option<i64>,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
}

/// Largest unit price a line may carry.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);
/// Largest order subtotal (9999999999.99), the ceiling of the `NUMERIC(12, 2)` money columns.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Money amounts carry at most this many decimal places.
pub const MONEY_SCALE: u32 = 2;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct OrderLineRequest {
    #[validate(required(message = "product id is required"))]
    pub product_id: Option<i64>,
    #[validate(custom = "not_blank")]
    #[serde(default)]
    pub product_name: String,
    #[validate(required(message = "unit price is required"), custom = "money_amount")]
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[validate(
        required(message = "quantity is required"),
        range(min = 1, max = 10_000, message = "quantity must be between 1 and 10000")
    )]
    #[serde(default)]
    pub quantity: Option<i32>,
}

impl OrderLineRequest {
    pub fn new(product_id: i64, product_name: impl Into<String>, unit_price: Decimal, quantity: i32) -> Self {
        Self { product_id: Some(product_id), product_name: product_name.into(), unit_price: Some(unit_price), quantity: Some(quantity) }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Positive, at most two decimal places, and no larger than [`MAX_UNIT_PRICE`].
fn money_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("not_positive"));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(ValidationError::new("too_many_decimal_places"));
    }
    if *value > MAX_UNIT_PRICE {
        return Err(ValidationError::new("too_large"));
    }
    Ok(())
}

/// A request that passed validation. Line order is preserved.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedOrder {
    pub customer_id: i64,
    pub lines: Vec<ValidatedLine>,
    pub coupon_code: Option<String>,
    pub shipping: ShippingDetails,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedLine {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl ValidatedLine {
    pub fn line_total(&self) -> Option<Decimal> { self.unit_price.checked_mul(Decimal::from(self.quantity)) }
}

impl ValidatedOrder {
    /// Sum of the line totals. Fails instead of overflowing or exceeding [`MAX_ORDER_TOTAL`].
    pub fn subtotal(&self) -> Result<Decimal, AssemblyError> {
        let total = self.lines.iter()
            .try_fold(Decimal::ZERO, |acc, line| line.line_total().and_then(|t| acc.checked_add(t)))
            .filter(|total| *total <= MAX_ORDER_TOTAL);
        total.ok_or_else(|| AssemblyError::Invalid(format!("order total exceeds {MAX_ORDER_TOTAL}")))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("{0}")]
    Invalid(String),
}

/// Rounds to cents, half away from zero, the way `NUMERIC(12, 2)` stores values.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OrderAssembler;

impl OrderAssembler {
    pub fn new() -> Self { Self }

    pub fn validate(&self, request: OrderRequest) -> Result<ValidatedOrder, AssemblyError> {
        if request.items.is_empty() {
            return Err(AssemblyError::EmptyOrder);
        }
        request.validate().map_err(|e| AssemblyError::Invalid(e.to_string()))?;
        let customer_id = request.customer_id.ok_or_else(|| AssemblyError::Invalid("customer id is required".into()))?;

        let mut lines = Vec::with_capacity(request.items.len());
        for (index, item) in request.items.into_iter().enumerate() {
            item.validate().map_err(|e| AssemblyError::Invalid(format!("item {}: {}", index + 1, e)))?;
            let (Some(product_id), Some(unit_price), Some(quantity)) = (item.product_id, item.unit_price, item.quantity) else {
                return Err(AssemblyError::Invalid(format!("item {}: product id, unit price and quantity are required", index + 1)));
            };
            lines.push(ValidatedLine {
                product_id,
                product_name: item.product_name.trim().to_string(),
                unit_price: unit_price.normalize(),
                quantity,
            });
        }

        let coupon_code = request.coupon_code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let order = ValidatedOrder { customer_id, lines, coupon_code, shipping: request.shipping };
        order.subtotal()?;
        Ok(order)
    }

    /// Builds the order header and its snapshot items. The total is the line
    /// subtotal minus the coupon discount, which is rounded to cents and
    /// clamped to the subtotal.
    pub fn assemble(&self, order: &ValidatedOrder, coupon: Option<&AppliedCoupon>) -> Result<NewOrder, AssemblyError> {
        if order.lines.is_empty() {
            return Err(AssemblyError::EmptyOrder);
        }
        let subtotal = order.subtotal()?;
        let discount = coupon.map(|c| round_money(c.discount).max(Decimal::ZERO).min(subtotal));
        let items = order.lines.iter().map(|line| NewOrderItem {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            price: line.unit_price,
            quantity: line.quantity,
        }).collect();

        Ok(NewOrder {
            customer_id: order.customer_id,
            subtotal,
            discount_amount: discount,
            total_amount: subtotal - discount.unwrap_or(Decimal::ZERO),
            coupon_code: coupon.map(|c| c.code().clone()),
            order_date: Utc::now(),
            status: OrderStatus::Pending,
            shipping: order.shipping.clone(),
            items,
        })
    }
}
