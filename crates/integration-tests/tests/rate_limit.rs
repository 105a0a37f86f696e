//! Per-IP rate limiting on coupon validation and auth routes.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use aurelia_integration_tests::{TestApp, TestResponse};

const COUPON_BURST: usize = 10;

async fn validate_from(app: &TestApp, ip: Option<&str>) -> TestResponse {
    let headers: Vec<(&str, &str)> = ip.map(|ip| ("x-forwarded-for", ip)).into_iter().collect();
    app.request_with_headers(
        Method::POST,
        "/api/coupons/validate",
        Some(json!({ "code": "NOPE", "email": "ruby@example.com", "subtotal": "50" })),
        None,
        &headers,
    )
    .await
}

#[tokio::test]
async fn test_request_without_client_address_is_not_server_error() {
    let app = TestApp::with_rate_limits();

    let response = validate_from(&app, None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.message(), "Invalid coupon code");
}

#[tokio::test]
async fn test_exceeding_burst_returns_json_429() {
    let app = TestApp::with_rate_limits();

    for _ in 0..COUPON_BURST {
        let response = validate_from(&app, Some("203.0.113.7")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    let mut limited = None;
    for _ in 0..5 {
        let response = validate_from(&app, Some("203.0.113.7")).await;
        if response.status == StatusCode::TOO_MANY_REQUESTS {
            limited = Some(response);
            break;
        }
    }
    let limited = limited.unwrap();
    assert_eq!(
        limited.message(),
        "Too many requests, please try again later"
    );

    // Another client keeps its own budget.
    let other = validate_from(&app, Some("198.51.100.9")).await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let app = TestApp::with_rate_limits();
    let body = json!({ "email": "ruby@example.com", "password": "wrong password" });

    let mut statuses = Vec::new();
    for _ in 0..10 {
        let response = app
            .request_with_headers(
                Method::POST,
                "/api/auth/login",
                Some(body.clone()),
                None,
                &[("x-forwarded-for", "203.0.113.8")],
            )
            .await;
        statuses.push(response.status);
    }

    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::UNAUTHORIZED));
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
}
