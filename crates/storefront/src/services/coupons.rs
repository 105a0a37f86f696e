//! Coupon validation and back-office coupon management.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use aurelia_core::{
    CouponCode, CouponCodeError, CouponId, CurrencyCode, DiscountType, Email, EmailError, Price,
    round_money,
};

use crate::db::{RepositoryError, Store};
use crate::models::{Coupon, NewCoupon};

/// Errors from coupon validation and management.
///
/// The `Display` text of the validation variants is shown to shoppers as-is.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Invalid coupon code")]
    NotFound,

    #[error("This coupon is no longer active")]
    Inactive,

    #[error("This coupon has expired")]
    Expired,

    #[error("You have already used this coupon")]
    AlreadyUsed,

    #[error("Minimum spend of {0} required for this coupon")]
    MinimumSpend(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Coupon code is required")]
    CodeRequired,

    #[error("Invalid coupon code: {0}")]
    InvalidCode(CouponCodeError),

    #[error("Coupon code already exists")]
    DuplicateCode,

    #[error("{0}")]
    InvalidValue(String),

    /// Admin operation on a coupon id that does not exist.
    #[error("Coupon not found")]
    UnknownId,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Successful validation result returned to the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
    pub valid: bool,
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
}

/// Back-office input for a new coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDraft {
    #[serde(default)]
    pub code: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default)]
    pub min_spend: Option<Decimal>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Check every redemption rule for `coupon` against a purchase.
///
/// Rules are checked in order: active, unexpired, not used by `email`,
/// subtotal meets minimum spend.
///
/// # Errors
///
/// Returns the `CouponError` variant for the first rule that fails.
pub fn check_coupon(
    coupon: &Coupon,
    email: &Email,
    subtotal: Decimal,
    now: DateTime<Utc>,
    currency: CurrencyCode,
) -> Result<(), CouponError> {
    if !coupon.active {
        return Err(CouponError::Inactive);
    }
    if coupon.is_expired_at(now) {
        return Err(CouponError::Expired);
    }
    if coupon.is_used_by(email) {
        return Err(CouponError::AlreadyUsed);
    }
    if subtotal < coupon.min_spend {
        return Err(CouponError::MinimumSpend(
            Price::new(coupon.min_spend, currency).display(),
        ));
    }
    Ok(())
}

/// Discount for `subtotal`, rounded to cents and never above the subtotal.
#[must_use]
pub fn compute_discount(discount_type: DiscountType, value: Decimal, subtotal: Decimal) -> Decimal {
    let raw = match discount_type {
        DiscountType::Percentage => subtotal * value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => value,
    };
    round_money(raw.min(subtotal).max(Decimal::ZERO))
}

fn validate_draft(draft: CouponDraft) -> Result<NewCoupon, CouponError> {
    let code = match draft.code.as_deref().map(str::trim) {
        None | Some("") => return Err(CouponError::CodeRequired),
        Some(raw) => CouponCode::parse(raw).map_err(CouponError::InvalidCode)?,
    };

    match draft.discount_type {
        DiscountType::Percentage if draft.value <= Decimal::ZERO || draft.value > Decimal::ONE_HUNDRED => {
            return Err(CouponError::InvalidValue(
                "Percentage discount must be greater than 0 and at most 100".to_owned(),
            ));
        }
        DiscountType::Fixed if draft.value <= Decimal::ZERO => {
            return Err(CouponError::InvalidValue(
                "Fixed discount must be greater than 0".to_owned(),
            ));
        }
        _ => {}
    }

    let min_spend = draft.min_spend.unwrap_or(Decimal::ZERO);
    if min_spend < Decimal::ZERO {
        return Err(CouponError::InvalidValue(
            "Minimum spend cannot be negative".to_owned(),
        ));
    }

    Ok(NewCoupon {
        code,
        discount_type: draft.discount_type,
        value: draft.value,
        min_spend,
        expires_at: draft.expires_at,
        active: draft.active.unwrap_or(true),
    })
}

/// Coupon operations over the store.
pub struct CouponService<'a> {
    store: &'a dyn Store,
    currency: CurrencyCode,
}

impl<'a> CouponService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, currency: CurrencyCode) -> Self {
        Self { store, currency }
    }

    /// Load the coupon for `raw_code` and check it against a purchase.
    ///
    /// A code that cannot be a coupon code is reported the same way as an
    /// unknown one.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound` for unknown codes, or the failing
    /// rule from [`check_coupon`].
    pub async fn applicable(
        &self,
        raw_code: &str,
        email: &Email,
        subtotal: Decimal,
    ) -> Result<Coupon, CouponError> {
        let code = CouponCode::parse(raw_code).map_err(|_| CouponError::NotFound)?;
        let coupon = self
            .store
            .coupon_by_code(&code)
            .await?
            .ok_or(CouponError::NotFound)?;

        check_coupon(&coupon, email, subtotal, Utc::now(), self.currency)?;
        Ok(coupon)
    }

    /// Validate a coupon for the checkout page.
    ///
    /// # Errors
    ///
    /// See [`Self::applicable`]; also `CouponError::InvalidEmail`, and
    /// `CouponError::InvalidValue` for a negative subtotal.
    #[instrument(skip(self, raw_code, email), fields(code = %raw_code))]
    pub async fn validate(
        &self,
        raw_code: &str,
        email: &str,
        subtotal: Decimal,
    ) -> Result<CouponValidation, CouponError> {
        if subtotal < Decimal::ZERO {
            return Err(CouponError::InvalidValue(
                "Subtotal cannot be negative".to_owned(),
            ));
        }
        let email = Email::parse(email)?;
        let coupon = self.applicable(raw_code, &email, subtotal).await?;

        Ok(CouponValidation {
            valid: true,
            code: coupon.code,
            discount_type: coupon.discount_type,
            discount_value: coupon.value,
        })
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, CouponError> {
        Ok(self.store.list_coupons().await?)
    }

    /// Validate and create a coupon.
    ///
    /// # Errors
    ///
    /// Returns a validation variant for bad input and
    /// `CouponError::DuplicateCode` if the code exists.
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: CouponDraft) -> Result<Coupon, CouponError> {
        let new = validate_draft(draft)?;
        let coupon = self.store.create_coupon(new).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => CouponError::DuplicateCode,
            other => CouponError::Repository(other),
        })?;

        tracing::info!(code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    /// Enable or disable a coupon.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::UnknownId` if the coupon does not exist.
    pub async fn set_active(&self, id: CouponId, active: bool) -> Result<Coupon, CouponError> {
        self.store
            .set_coupon_active(id, active)
            .await
            .map_err(not_found_as_unknown)
    }

    /// Hard delete a coupon.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::UnknownId` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), CouponError> {
        self.store
            .delete_coupon(id)
            .await
            .map_err(not_found_as_unknown)?;
        tracing::info!(coupon_id = %id, "Coupon deleted");
        Ok(())
    }
}

fn not_found_as_unknown(e: RepositoryError) -> CouponError {
    match e {
        RepositoryError::NotFound => CouponError::UnknownId,
        other => CouponError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon() -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: CouponCode::parse("SPARKLE10").unwrap(),
            discount_type: DiscountType::Percentage,
            value: Decimal::new(10, 0),
            min_spend: Decimal::new(5000, 2),
            expires_at: None,
            active: true,
            used_by: vec![Email::parse("used@example.com").unwrap()],
            created_at: Utc::now(),
        }
    }

    fn shopper() -> Email {
        Email::parse("shopper@example.com").unwrap()
    }

    fn check(coupon: &Coupon, email: &Email, subtotal: i64) -> Result<(), CouponError> {
        check_coupon(
            coupon,
            email,
            Decimal::new(subtotal, 0),
            Utc::now(),
            CurrencyCode::USD,
        )
    }

    #[test]
    fn test_valid_coupon_passes() {
        assert!(check(&coupon(), &shopper(), 100).is_ok());
    }

    #[test]
    fn test_inactive_coupon_rejected() {
        let mut c = coupon();
        c.active = false;
        let err = check(&c, &shopper(), 100).unwrap_err();
        assert_eq!(err.to_string(), "This coupon is no longer active");
    }

    #[test]
    fn test_expired_coupon_rejected() {
        let mut c = coupon();
        c.expires_at = Some(Utc::now() - Duration::days(1));
        let err = check(&c, &shopper(), 100).unwrap_err();
        assert_eq!(err.to_string(), "This coupon has expired");
    }

    #[test]
    fn test_future_expiry_accepted() {
        let mut c = coupon();
        c.expires_at = Some(Utc::now() + Duration::days(1));
        assert!(check(&c, &shopper(), 100).is_ok());
    }

    #[test]
    fn test_used_by_same_email_any_case_rejected() {
        let email = Email::parse("USED@Example.com").unwrap();
        let err = check(&coupon(), &email, 100).unwrap_err();
        assert_eq!(err.to_string(), "You have already used this coupon");
    }

    #[test]
    fn test_minimum_spend_message_includes_amount() {
        let err = check(&coupon(), &shopper(), 20).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Minimum spend of $50.00 required for this coupon"
        );
    }

    #[test]
    fn test_inactive_checked_before_expiry() {
        let mut c = coupon();
        c.active = false;
        c.expires_at = Some(Utc::now() - Duration::days(1));
        assert!(matches!(
            check(&c, &shopper(), 100),
            Err(CouponError::Inactive)
        ));
    }

    #[test]
    fn test_percentage_discount_rounds_to_cents() {
        let discount = compute_discount(
            DiscountType::Percentage,
            Decimal::new(15, 0),
            Decimal::new(3333, 2),
        );
        assert_eq!(discount, Decimal::new(500, 2));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let discount = compute_discount(
            DiscountType::Fixed,
            Decimal::new(100, 0),
            Decimal::new(4000, 2),
        );
        assert_eq!(discount, Decimal::new(4000, 2));
    }

    #[test]
    fn test_full_percentage_discount_equals_subtotal() {
        let subtotal = Decimal::new(12_345, 2);
        let discount = compute_discount(DiscountType::Percentage, Decimal::ONE_HUNDRED, subtotal);
        assert_eq!(discount, subtotal);
    }

    fn draft(code: Option<&str>, discount_type: DiscountType, value: i64) -> CouponDraft {
        CouponDraft {
            code: code.map(str::to_owned),
            discount_type,
            value: Decimal::new(value, 0),
            min_spend: None,
            expires_at: None,
            active: None,
        }
    }

    #[test]
    fn test_draft_uppercases_code_and_defaults() {
        let new = validate_draft(draft(Some(" gold20 "), DiscountType::Percentage, 20)).unwrap();
        assert_eq!(new.code.as_str(), "GOLD20");
        assert_eq!(new.min_spend, Decimal::ZERO);
        assert!(new.active);
    }

    #[test]
    fn test_draft_requires_code() {
        for code in [None, Some("   ")] {
            let err = validate_draft(draft(code, DiscountType::Fixed, 5)).unwrap_err();
            assert_eq!(err.to_string(), "Coupon code is required");
        }
    }

    #[test]
    fn test_draft_rejects_out_of_range_percentage() {
        assert!(validate_draft(draft(Some("A"), DiscountType::Percentage, 0)).is_err());
        assert!(validate_draft(draft(Some("A"), DiscountType::Percentage, 101)).is_err());
        assert!(validate_draft(draft(Some("A"), DiscountType::Percentage, 100)).is_ok());
    }

    #[test]
    fn test_draft_rejects_non_positive_fixed() {
        assert!(validate_draft(draft(Some("A"), DiscountType::Fixed, 0)).is_err());
        assert!(validate_draft(draft(Some("A"), DiscountType::Fixed, -5)).is_err());
    }
}
