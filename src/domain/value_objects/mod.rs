//! Value Objects for order placement

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coupon code value object. Codes are stored uppercase and matched case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > 50 { return Err(CouponCodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CouponCodeError { Empty, TooLong }
impl std::error::Error for CouponCodeError {}
impl fmt::Display for CouponCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "coupon code empty"), Self::TooLong => write!(f, "coupon code too long") }
    }
}

/// Carrier tracking number, derived from the order id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    pub const PREFIX: &'static str = "TRK";

    pub fn for_order(order_id: i64) -> Self { Self(format!("{}{:08}", Self::PREFIX, order_id)) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_coupon_code() { let code = CouponCode::new(" save10 ").unwrap(); assert_eq!(code.as_str(), "SAVE10"); }
    #[test]
    fn test_blank_coupon_code() { assert_eq!(CouponCode::new("   "), Err(CouponCodeError::Empty)); }
    #[test]
    fn test_tracking_number() {
        assert_eq!(TrackingNumber::for_order(42).as_str(), "TRK00000042");
        assert_eq!(TrackingNumber::for_order(123456789).as_str(), "TRK123456789");
    }
}
