//! Back-office bulk stock updates.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use aurelia_integration_tests::{TestApp, assert_stock};

async fn admin_app() -> (TestApp, String) {
    let app = TestApp::new();
    app.admin("owner@aurelia.test").await;
    let cookie = app.login("owner@aurelia.test").await;
    (app, cookie)
}

#[tokio::test]
async fn test_bulk_update_sets_levels_and_status() {
    let (app, cookie) = admin_app().await;
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    let studs = app.seed_product("Pearl Studs", "pearl-studs", "19.99", 0).await;

    let response = app
        .request(
            Method::PUT,
            "/api/admin/inventory",
            Some(json!([
                { "id": ring.id, "stock": 0 },
                { "id": studs.id, "stock": 25 }
            ])),
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_stock(app.store.as_ref(), ring.id, 0).await;
    assert_stock(app.store.as_ref(), studs.id, 25).await;

    let items = response.body.as_array().unwrap();
    let ring_row = items.iter().find(|i| i["id"] == ring.id.as_i32()).unwrap();
    assert_eq!(ring_row["stockStatus"], "out_of_stock");
    assert_eq!(ring_row["lowStock"], true);
    let studs_row = items.iter().find(|i| i["id"] == studs.id.as_i32()).unwrap();
    assert_eq!(studs_row["stockStatus"], "in_stock");
    assert_eq!(studs_row["lowStock"], false);
}

#[tokio::test]
async fn test_unknown_product_aborts_whole_batch() {
    let (app, cookie) = admin_app().await;
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    let response = app
        .request(
            Method::PUT,
            "/api/admin/inventory",
            Some(json!([
                { "id": ring.id, "stock": 3 },
                { "id": 9999, "stock": 3 }
            ])),
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_stock(app.store.as_ref(), ring.id, 10).await;
}

#[tokio::test]
async fn test_rejects_empty_and_negative_batches() {
    let (app, cookie) = admin_app().await;
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    let empty = app
        .request(Method::PUT, "/api/admin/inventory", Some(json!([])), Some(&cookie))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let negative = app
        .request(
            Method::PUT,
            "/api/admin/inventory",
            Some(json!([{ "id": ring.id, "stock": -1 }])),
            Some(&cookie),
        )
        .await;
    assert_eq!(negative.status, StatusCode::BAD_REQUEST);
    assert_stock(app.store.as_ref(), ring.id, 10).await;
}

#[tokio::test]
async fn test_catalog_reflects_update() {
    let (app, cookie) = admin_app().await;
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    // Warm the catalog cache first.
    let before = app.get("/api/products?inStock=true", None).await;
    assert_eq!(before.body.as_array().unwrap().len(), 1);

    app.request(
        Method::PUT,
        "/api/admin/inventory",
        Some(json!([{ "id": ring.id, "stock": 0 }])),
        Some(&cookie),
    )
    .await;

    let after = app.get("/api/products?inStock=true", None).await;
    assert_eq!(after.status, StatusCode::OK);
    assert!(after.body.as_array().unwrap().is_empty());
}
