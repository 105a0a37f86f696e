//! Wishlist toggling for signed-in customers.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use aurelia_integration_tests::TestApp;

#[tokio::test]
async fn test_toggle_alternates_membership() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.customer("ruby@example.com").await;
    let cookie = app.login("ruby@example.com").await;

    let added = app
        .post(
            "/api/account/wishlist/toggle",
            json!({ "productId": ring.id }),
            Some(&cookie),
        )
        .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.body["inWishlist"], true);
    assert_eq!(added.body["wishlist"], json!([ring.id]));

    let listed = app.get("/api/account/wishlist", Some(&cookie)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body[0]["slug"], "opal-ring");

    let removed = app
        .post(
            "/api/account/wishlist/toggle",
            json!({ "productId": ring.id }),
            Some(&cookie),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["inWishlist"], false);
    assert_eq!(removed.body["wishlist"], json!([]));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;
    let cookie = app.login("ruby@example.com").await;

    let response = app
        .post(
            "/api/account/wishlist/toggle",
            json!({ "productId": 9999 }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wishlist_requires_session() {
    let app = TestApp::new();
    let response = app.get("/api/account/wishlist", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
