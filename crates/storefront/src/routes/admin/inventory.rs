//! Inventory administration.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::StockUpdate;
use crate::routes::ApiJson;
use crate::services::inventory::{InventoryItem, InventoryService};
use crate::state::AppState;

/// Stock levels for every product.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<InventoryItem>>> {
    Ok(Json(InventoryService::new(state.store()).list().await?))
}

/// Set stock levels for a batch of products; all or nothing.
#[instrument(skip(state, admin, updates), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(updates): ApiJson<Vec<StockUpdate>>,
) -> Result<Json<Vec<InventoryItem>>> {
    let items = InventoryService::new(state.store())
        .bulk_update(&updates)
        .await?;
    state.catalog().invalidate().await;
    Ok(Json(items))
}
