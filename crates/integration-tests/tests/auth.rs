//! Registration, sessions, email verification and password reset.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use aurelia_integration_tests::{TEST_PASSWORD, TestApp};

/// Pull the token out of the link in the most recent email.
async fn last_token(app: &TestApp) -> String {
    let sent = app.mailer.sent().await;
    let body = &sent.last().unwrap().text_body;
    let start = body.find("token=").unwrap() + "token=".len();
    body[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect()
}

#[tokio::test]
async fn test_register_starts_session_and_sends_verification() {
    let app = TestApp::new();

    let response = app
        .post(
            "/api/auth/register",
            json!({ "email": "Ruby@Example.com", "password": TEST_PASSWORD, "name": "Ruby" }),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["email"], "ruby@example.com");
    assert_eq!(response.body["role"], "customer");
    assert_eq!(response.body["emailVerified"], false);
    assert!(response.body.get("passwordHash").is_none());

    let cookie = response.cookie.unwrap();
    let me = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "ruby@example.com");

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text_body.contains("/verify-email?token="));
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;

    let duplicate = app
        .post(
            "/api/auth/register",
            json!({ "email": "RUBY@example.com", "password": TEST_PASSWORD, "name": "Ruby" }),
            None,
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let weak = app
        .post(
            "/api/auth/register",
            json!({ "email": "opal@example.com", "password": "short", "name": "Opal" }),
            None,
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;

    let wrong_password = app
        .post(
            "/api/auth/login",
            json!({ "email": "ruby@example.com", "password": "not the password" }),
            None,
        )
        .await;
    let unknown_user = app
        .post(
            "/api/auth/login",
            json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.message(), unknown_user.message());
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;
    let cookie = app.login("ruby@example.com").await;

    let logout = app.post("/api/auth/logout", json!({}), Some(&cookie)).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let me = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verification_token_is_single_use() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;
    let token = last_token(&app).await;

    let verified = app
        .post("/api/auth/verify-email", json!({ "token": token }), None)
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["emailVerified"], true);

    let reused = app
        .post("/api/auth/verify-email", json!({ "token": token }), None)
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.customer("ruby@example.com").await;

    let unknown = app
        .post(
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
            None,
        )
        .await;
    let known = app
        .post(
            "/api/auth/forgot-password",
            json!({ "email": "ruby@example.com" }),
            None,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(unknown.message(), known.message());

    let token = last_token(&app).await;
    let reset = app
        .post(
            "/api/auth/reset-password",
            json!({ "token": token, "password": "a brand new passphrase" }),
            None,
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);

    let old = app
        .post(
            "/api/auth/login",
            json!({ "email": "ruby@example.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .post(
            "/api/auth/login",
            json!({ "email": "ruby@example.com", "password": "a brand new passphrase" }),
            None,
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);

    let reused = app
        .post(
            "/api/auth/reset-password",
            json!({ "token": token, "password": "yet another passphrase" }),
            None,
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}
