//! Signed-in customer routes: order history and wishlist.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use aurelia_core::{OrderId, ProductId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, Product};
use crate::routes::ApiJson;
use crate::services::orders::OrderService;
use crate::services::wishlist::{WishlistService, WishlistToggle};
use crate::state::AppState;

/// Wishlist toggle request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleWishlistRequest {
    pub product_id: ProductId,
}

/// Orders placed with the session email, newest first.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderService::new(state.store(), state.notifier(), state.currency())
        .for_customer(&user.email)
        .await?;
    Ok(Json(orders))
}

/// One of the session user's orders; other customers' orders are 404.
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.store(), state.notifier(), state.currency())
        .get_for_customer(id, &user.email)
        .await?;
    Ok(Json(order))
}

/// Wishlist products.
pub async fn wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(WishlistService::new(state.store()).products(user.id).await?))
}

/// Add or remove a product.
pub async fn toggle_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ToggleWishlistRequest>,
) -> Result<Json<WishlistToggle>> {
    let toggle = WishlistService::new(state.store())
        .toggle(user.id, body.product_id)
        .await?;
    Ok(Json(toggle))
}
