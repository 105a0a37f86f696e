//! Coupon validation for the checkout page.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::Result;
use crate::routes::ApiJson;
use crate::services::coupons::{CouponService, CouponValidation};
use crate::state::AppState;

/// Coupon validation request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    pub email: String,
    pub subtotal: Decimal,
}

/// Check whether a coupon applies to this purchaser and subtotal.
pub async fn validate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ValidateCouponRequest>,
) -> Result<Json<CouponValidation>> {
    let validation = CouponService::new(state.store(), state.currency())
        .validate(&body.code, &body.email, body.subtotal)
        .await?;
    Ok(Json(validation))
}
