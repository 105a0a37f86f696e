//! Coupon administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use aurelia_core::CouponId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Coupon;
use crate::routes::ApiJson;
use crate::services::coupons::{CouponDraft, CouponService};
use crate::state::AppState;

/// Active flag request body.
#[derive(Debug, Deserialize)]
pub struct ActiveUpdate {
    pub active: bool,
}

fn service(state: &AppState) -> CouponService<'_> {
    CouponService::new(state.store(), state.currency())
}

/// All coupons, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Coupon>>> {
    Ok(Json(service(&state).list().await?))
}

/// Create a coupon.
#[instrument(skip(state, admin, draft), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(draft): ApiJson<CouponDraft>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let coupon = service(&state).create(draft).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Enable or disable a coupon.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_active(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    ApiJson(body): ApiJson<ActiveUpdate>,
) -> Result<Json<Coupon>> {
    Ok(Json(service(&state).set_active(id, body.active).await?))
}

/// Hard delete a coupon.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
