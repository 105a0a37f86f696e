//! Order creation through `POST /api/orders`.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;

use aurelia_core::DiscountType;
use aurelia_integration_tests::{TestApp, assert_stock, dec, order_body};

#[tokio::test]
async fn test_order_decrements_each_line_by_its_quantity() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    let studs = app.seed_product("Pearl Studs", "pearl-studs", "19.99", 5).await;
    let chain = app.seed_product("Gold Chain", "gold-chain", "99.00", 3).await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 2), (studs.id, 1)], "ruby@example.com", None),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "pending");
    assert_eq!(dec(response.body["subtotal"].as_str().unwrap()), dec("99.99"));
    assert_eq!(dec(response.body["total"].as_str().unwrap()), dec("99.99"));
    assert!(
        response.body["orderNumber"]
            .as_str()
            .unwrap()
            .starts_with("ORD-")
    );

    assert_stock(app.store.as_ref(), ring.id, 8).await;
    assert_stock(app.store.as_ref(), studs.id, 4).await;
    assert_stock(app.store.as_ref(), chain.id, 3).await;
}

#[tokio::test]
async fn test_server_recomputes_discount() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.seed_coupon("SPARKLE10", DiscountType::Percentage, "10").await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 3)], "ruby@example.com", Some("sparkle10")),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(dec(response.body["subtotal"].as_str().unwrap()), dec("120"));
    assert_eq!(dec(response.body["discount"].as_str().unwrap()), dec("12"));
    assert_eq!(dec(response.body["total"].as_str().unwrap()), dec("108"));
    assert_eq!(response.body["couponCode"], "SPARKLE10");
}

#[tokio::test]
async fn test_invalid_coupon_creates_no_order() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "ruby@example.com", Some("NOSUCHCODE")),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.message(), "Invalid coupon code");
    assert_eq!(app.order_count().await, 0);
    assert_stock(app.store.as_ref(), ring.id, 10).await;
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict_and_changes_nothing() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    let studs = app.seed_product("Pearl Studs", "pearl-studs", "19.99", 1).await;
    app.seed_coupon("SPARKLE10", DiscountType::Percentage, "10").await;

    let response = app
        .post(
            "/api/orders",
            order_body(
                &[(ring.id, 2), (studs.id, 2)],
                "ruby@example.com",
                Some("SPARKLE10"),
            ),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.message(), "Insufficient stock for Pearl Studs");
    assert_eq!(app.order_count().await, 0);
    assert_stock(app.store.as_ref(), ring.id, 10).await;
    assert_stock(app.store.as_ref(), studs.id, 1).await;

    // The coupon was not burned by the failed attempt.
    let retry = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 2)], "ruby@example.com", Some("SPARKLE10")),
            None,
        )
        .await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_product_is_bad_request() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    let missing = aurelia_core::ProductId::new(ring.id.as_i32() + 100);

    let response = app
        .post(
            "/api/orders",
            order_body(&[(missing, 1)], "ruby@example.com", None),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn test_payload_validation() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    let empty = app
        .post("/api/orders", order_body(&[], "ruby@example.com", None), None)
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    let zero = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 0)], "ruby@example.com", None),
            None,
        )
        .await;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let bad_email = app
        .post("/api/orders", order_body(&[(ring.id, 1)], "not-an-email", None), None)
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn test_same_coupon_concurrently_by_different_purchasers() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.seed_coupon("SHARED5", DiscountType::Fixed, "5").await;

    let body_a = order_body(&[(ring.id, 1)], "ada@example.com", Some("SHARED5"));
    let body_b = order_body(&[(ring.id, 1)], "bea@example.com", Some("SHARED5"));
    let (a, b) = tokio::join!(
        app.post("/api/orders", body_a, None),
        app.post("/api/orders", body_b, None),
    );

    assert_eq!(a.status, StatusCode::CREATED);
    assert_eq!(b.status, StatusCode::CREATED);
    assert_eq!(app.order_count().await, 2);
    assert_stock(app.store.as_ref(), ring.id, 8).await;
}

#[tokio::test]
async fn test_same_coupon_concurrently_by_same_purchaser() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.seed_coupon("ONCE10", DiscountType::Percentage, "10").await;

    let body = order_body(&[(ring.id, 1)], "ada@example.com", Some("ONCE10"));
    let (a, b) = tokio::join!(
        app.post("/api/orders", body.clone(), None),
        app.post("/api/orders", body, None),
    );

    let created = [a.status, b.status]
        .iter()
        .filter(|s| **s == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    let rejected = if a.status == StatusCode::CREATED { b } else { a };
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.message(), "You have already used this coupon");
    assert_eq!(app.order_count().await, 1);
    assert_stock(app.store.as_ref(), ring.id, 9).await;
}

#[tokio::test]
async fn test_email_failure_does_not_fail_order() {
    let app = TestApp::with_failing_mailer();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.admin("owner@aurelia.test").await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "ruby@example.com", None),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(app.order_count().await, 1);
}

#[tokio::test]
async fn test_receipt_and_one_batched_admin_alert() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    app.admin("owner@aurelia.test").await;
    app.admin("ops@aurelia.test").await;
    app.mailer.clear().await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "ruby@example.com", None),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let number = response.body["orderNumber"].as_str().unwrap();

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 2);

    let receipt = sent
        .iter()
        .find(|m| m.to.iter().any(|e| e.as_str() == "ruby@example.com"))
        .unwrap();
    assert!(receipt.subject.contains(number));

    let alert = sent
        .iter()
        .find(|m| m.subject.starts_with("New order"))
        .unwrap();
    let mut recipients: Vec<&str> = alert.to.iter().map(|e| e.as_str()).collect();
    recipients.sort_unstable();
    assert_eq!(recipients, vec!["ops@aurelia.test", "owner@aurelia.test"]);
}

#[tokio::test]
async fn test_no_admin_alert_without_admins() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;

    let response = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "ruby@example.com", None),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn test_signed_in_order_is_linked_and_listed() {
    let app = TestApp::new();
    let ring = app.seed_product("Opal Ring", "opal-ring", "40.00", 10).await;
    let user = app.customer("ruby@example.com").await;
    let cookie = app.login("ruby@example.com").await;

    let placed = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "ruby@example.com", None),
            Some(&cookie),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    assert_eq!(placed.body["userId"], user.id.as_i32());

    // Someone else's order must stay invisible.
    let other = app
        .post(
            "/api/orders",
            order_body(&[(ring.id, 1)], "opal@example.com", None),
            None,
        )
        .await;

    let mine = app.get("/api/account/orders", Some(&cookie)).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.body.as_array().unwrap().len(), 1);

    let other_id = other.body["id"].as_i64().unwrap();
    let hidden = app
        .get(&format!("/api/account/orders/{other_id}"), Some(&cookie))
        .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let own_id = placed.body["id"].as_i64().unwrap();
    let shown = app
        .get(&format!("/api/account/orders/{own_id}"), Some(&cookie))
        .await;
    assert_eq!(shown.status, StatusCode::OK);
}
