//! Dashboard and customer listing.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::services::dashboard::{DashboardService, DashboardSummary};
use crate::state::AppState;

/// Order counts, revenue, low-stock products and the latest orders.
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<DashboardSummary>> {
    Ok(Json(DashboardService::new(state.store()).summary().await?))
}

/// Customer accounts, without credentials.
pub async fn customers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(DashboardService::new(state.store()).customers().await?))
}
