//! Coupon redemption guard.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::aggregates::Coupon;
use crate::domain::value_objects::CouponCode;
use crate::store::{Store, StoreError, Transaction};

#[derive(Error, Debug)]
pub enum CouponError {
    #[error("invalid coupon code")]
    InvalidCode,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit reached")]
    UsageLimitReached,

    #[error("minimum order amount of {minimum} required for this coupon")]
    BelowMinimumOrder { minimum: Decimal },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CouponError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCode => "INVALID_COUPON_CODE",
            Self::Expired => "COUPON_EXPIRED",
            Self::UsageLimitReached => "COUPON_USAGE_LIMIT_REACHED",
            Self::BelowMinimumOrder { .. } => "BELOW_MINIMUM_ORDER",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }
}

/// A coupon together with the discount it grants on one order total.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedCoupon {
    pub coupon: Coupon,
    pub discount: Decimal,
}

impl AppliedCoupon {
    pub fn code(&self) -> &CouponCode { &self.coupon.code }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CouponGuard;

impl CouponGuard {
    pub fn new() -> Self { Self }

    /// Read-only eligibility check.
    #[instrument(skip_all, fields(code = %code, order_total = %order_total))]
    pub async fn validate(&self, tx: &mut dyn Transaction, code: &str, order_total: Decimal) -> Result<Coupon, CouponError> {
        let code = CouponCode::new(code).map_err(|_| CouponError::InvalidCode)?;
        let coupon = tx.find_coupon(&code).await?.ok_or(CouponError::InvalidCode)?;
        check_eligibility(&coupon, order_total)?;
        Ok(coupon)
    }

    /// Re-validates, then consumes one use of the coupon inside `tx`.
    ///
    /// The usage increment is conditional on the limit, so when several orders
    /// race for the last use exactly one of them gets it.
    #[instrument(skip_all, fields(code = %code, order_total = %order_total))]
    pub async fn redeem(&self, tx: &mut dyn Transaction, code: &str, order_total: Decimal) -> Result<AppliedCoupon, CouponError> {
        let mut coupon = self.validate(tx, code, order_total).await?;
        let used = tx.redeem_coupon(&coupon.code).await?.ok_or(CouponError::UsageLimitReached)?;
        coupon.used_count = used;
        let discount = coupon.calculate_discount(order_total);
        debug!(code = %coupon.code, used, %discount, "coupon redeemed");
        Ok(AppliedCoupon { coupon, discount })
    }

    /// Quotes the discount for `order_total` without consuming a use.
    pub async fn preview(&self, store: &dyn Store, code: &str, order_total: Decimal) -> Result<AppliedCoupon, CouponError> {
        let mut tx = store.begin().await?;
        let checked = self.validate(tx.as_mut(), code, order_total).await;
        tx.rollback().await?;
        let coupon = checked?;
        let discount = coupon.calculate_discount(order_total);
        Ok(AppliedCoupon { coupon, discount })
    }
}

fn check_eligibility(coupon: &Coupon, order_total: Decimal) -> Result<(), CouponError> {
    let now = Utc::now();
    if !coupon.is_active {
        return Err(CouponError::InvalidCode);
    }
    if coupon.is_expired_at(now) {
        return Err(CouponError::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponError::UsageLimitReached);
    }
    match coupon.min_order_amount {
        Some(minimum) if order_total < minimum => Err(CouponError::BelowMinimumOrder { minimum }),
        _ => Ok(()),
    }
}
