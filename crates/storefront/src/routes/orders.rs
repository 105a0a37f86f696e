//! Order creation.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::Order;
use crate::routes::ApiJson;
use crate::services::orders::{OrderService, PlaceOrderRequest};
use crate::state::AppState;

/// Create an order. Guests may order; a session links the order to the user.
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(state.store(), state.notifier(), state.currency())
        .place(body, user.map(|u| u.id))
        .await?;

    // Stock levels changed.
    state.catalog().invalidate().await;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", order.order_number.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(order)))
}
