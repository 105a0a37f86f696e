//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness
//! GET    /health/ready                - Store connectivity
//!
//! # Catalog
//! GET    /api/products                - Product listing (?category=&inStock=)
//! GET    /api/products/{slug}         - Product detail
//! GET    /api/categories              - Category listing
//!
//! # Auth (rate limited)
//! POST   /api/auth/register           - Create a customer account
//! POST   /api/auth/login              - Start a session
//! POST   /api/auth/logout             - End the session
//! GET    /api/auth/me                 - Current session user
//! POST   /api/auth/verify-email       - Redeem a verification token
//! POST   /api/auth/forgot-password    - Email a reset token
//! POST   /api/auth/reset-password     - Redeem a reset token
//!
//! # Checkout
//! POST   /api/coupons/validate        - Check a coupon (rate limited)
//! POST   /api/checkout/session        - Card hosted checkout session
//! POST   /api/checkout/wallet/orders  - Wallet order
//! POST   /api/checkout/wallet/orders/{id}/capture - Capture wallet order
//! POST   /api/orders                  - Create an order (guests allowed)
//!
//! # Account (requires auth)
//! GET    /api/account/orders          - My orders
//! GET    /api/account/orders/{id}     - One of my orders
//! GET    /api/account/wishlist        - My wishlist
//! POST   /api/account/wishlist/toggle - Add or remove a product
//!
//! # Back office (requires admin)
//! See [`admin`].
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod health;
pub mod orders;

use axum::{
    Json, Router,
    extract::FromRequest,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, coupon_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejections use the `{ "message": ... }` shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::show_product))
        .route("/categories", get(catalog::list_categories))
}

/// Create the auth routes router.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/verify-email", post(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    if rate_limit {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create the coupon routes router.
pub fn coupon_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new().route("/validate", post(coupons::validate));

    if rate_limit {
        router.layer(coupon_rate_limiter())
    } else {
        router
    }
}

/// Create the checkout (payment) routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(checkout::create_card_session))
        .route("/wallet/orders", post(checkout::create_wallet_order))
        .route(
            "/wallet/orders/{id}/capture",
            post(checkout::capture_wallet_order),
        )
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
        .route("/wishlist", get(account::wishlist))
        .route("/wishlist/toggle", post(account::toggle_wishlist))
}

/// Create all routes for the storefront.
///
/// `rate_limit` enables the per-IP limiters; they key on proxy headers, so
/// in-process tests turn them off.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", catalog_routes())
        .nest("/api/auth", auth_routes(rate_limit))
        .nest("/api/coupons", coupon_routes(rate_limit))
        .nest("/api/checkout", checkout_routes())
        .route("/api/orders", post(orders::create))
        .nest("/api/account", account_routes())
        .nest("/api/admin", admin::routes())
}
