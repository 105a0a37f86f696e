//! Back-office JSON API. Every handler takes [`RequireAdmin`], so anonymous
//! requests get 401 and customers get 403.
//!
//! ```text
//! GET    /api/admin/dashboard             - Counts, revenue, low stock, recent orders
//! GET    /api/admin/customers             - Customer accounts
//! GET    /api/admin/orders                - All orders (?status=)
//! GET    /api/admin/orders/{id}           - Order detail
//! PATCH  /api/admin/orders/{id}/status    - Set status
//! DELETE /api/admin/orders/{id}           - Hard delete
//! GET    /api/admin/inventory             - Stock levels
//! PUT    /api/admin/inventory             - Bulk stock update
//! GET    /api/admin/coupons               - All coupons
//! POST   /api/admin/coupons               - Create coupon
//! PATCH  /api/admin/coupons/{id}/active   - Toggle active flag
//! DELETE /api/admin/coupons/{id}          - Hard delete
//! ```
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod coupons;
pub mod dashboard;
pub mod inventory;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::state::AppState;

/// Create the back-office routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::summary))
        .route("/customers", get(dashboard::customers))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show).delete(orders::delete))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/inventory", get(inventory::index).put(inventory::update))
        .route("/coupons", get(coupons::index).post(coupons::create))
        .route("/coupons/{id}", axum::routing::delete(coupons::delete))
        .route("/coupons/{id}/active", patch(coupons::set_active))
}
