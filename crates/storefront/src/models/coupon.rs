//! Coupon domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use aurelia_core::{CouponCode, CouponId, DiscountType, Email};

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    /// Unique, uppercased code.
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Percentage (0-100] or flat amount, depending on `discount_type`.
    pub value: Decimal,
    /// Minimum order subtotal required to apply the coupon.
    pub min_spend: Decimal,
    /// No expiry when `None`.
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// Emails that have redeemed this coupon.
    pub used_by: Vec<Email>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Whether `email` has already redeemed this coupon.
    #[must_use]
    pub fn is_used_by(&self, email: &Email) -> bool {
        self.used_by.iter().any(|used| used == email)
    }
}

/// Input for creating a coupon (already validated).
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_spend: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Marks a coupon as used by an email, committed together with an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRedemption {
    pub coupon_id: CouponId,
    pub email: Email,
}
