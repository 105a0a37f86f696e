//! Payment session handlers.
//!
//! These only talk to the processors. The order document is created by
//! `POST /api/orders` once the client reports a successful payment.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::{Result, add_breadcrumb};
use crate::routes::ApiJson;
use crate::services::payments::{
    CheckoutRequest, CheckoutService, CheckoutSession, WalletCapture, WalletOrder,
};
use crate::state::AppState;

fn checkout(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(
        state.store(),
        state.payments(),
        state.currency(),
        state.base_url(),
    )
}

/// Create a hosted card checkout session.
pub async fn create_card_session(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    let session = checkout(&state).card_session(body).await?;
    add_breadcrumb(
        "checkout",
        "Card checkout session created",
        Some(&[("session_id", session.id.as_str())]),
    );
    Ok(Json(session))
}

/// Create a wallet order.
pub async fn create_wallet_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> Result<Json<WalletOrder>> {
    let order = checkout(&state).wallet_order(body).await?;
    add_breadcrumb(
        "checkout",
        "Wallet order created",
        Some(&[("wallet_order_id", order.id.as_str())]),
    );
    Ok(Json(order))
}

/// Capture an approved wallet order.
pub async fn capture_wallet_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WalletCapture>> {
    Ok(Json(checkout(&state).wallet_capture(&id).await?))
}
