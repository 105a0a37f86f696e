//! Integration test harness for Aurelia Jewels.
//!
//! Tests drive the real router with `tower::ServiceExt::oneshot` over the
//! in-memory store and an in-memory session store, so no database or
//! network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p aurelia-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

use aurelia_core::{CouponCode, CurrencyCode, DiscountType, ProductId};
use aurelia_storefront::db::{CatalogStore, CouponStore, MemoryStore, OrderStore, Store};
use aurelia_storefront::models::{
    Category, Coupon, NewCategory, NewCoupon, NewProduct, Product, User,
};
use aurelia_storefront::services::auth::AuthService;
use aurelia_storefront::services::email::{MailError, Mailer, OutgoingEmail};
use aurelia_storefront::services::payments::PaymentClients;
use aurelia_storefront::state::{AppState, StateSettings};

/// Password used for every account the harness creates.
pub const TEST_PASSWORD: &str = "correct horse battery";

const BODY_LIMIT: usize = 1024 * 1024;

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    /// Messages sent so far, oldest first.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}

/// Mailer whose transport is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: OutgoingEmail) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_owned()))
    }
}

/// Decoded response from the router.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// `name=value` part of a `Set-Cookie` header, if any.
    pub cookie: Option<String>,
}

impl TestResponse {
    /// The `message` field of an error body.
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// Application wired to in-memory backends.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// App whose emails land in [`Self::mailer`].
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        Self::build(mailer.clone(), mailer, false)
    }

    /// App with the per-IP rate limiters on the auth and coupon routes.
    pub fn with_rate_limits() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        Self::build(mailer.clone(), mailer, true)
    }

    /// App whose every email send fails.
    pub fn with_failing_mailer() -> Self {
        Self::build(
            Arc::new(FailingMailer),
            Arc::new(RecordingMailer::default()),
            false,
        )
    }

    fn build(mailer: Arc<dyn Mailer>, recorder: Arc<RecordingMailer>, rate_limit: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            mailer,
            PaymentClients::default(),
            StateSettings {
                base_url: "http://localhost:3000".to_owned(),
                currency: CurrencyCode::USD,
            },
        );
        let router = aurelia_storefront::app(
            state.clone(),
            tower_sessions::MemoryStore::default(),
            false,
            rate_limit,
        );

        Self {
            store,
            mailer: recorder,
            state,
            router,
        }
    }

    /// Send one request through the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        self.request_with_headers(method, uri, body, cookie, &[]).await
    }

    /// Send one request with extra headers.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_owned);
        let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            body,
            cookie,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    pub async fn seed_category(&self, name: &str, slug: &str) -> Category {
        self.store
            .create_category(NewCategory {
                name: name.to_owned(),
                slug: slug.to_owned(),
            })
            .await
            .unwrap()
    }

    /// Product with SKU derived from the slug.
    pub async fn seed_product(&self, name: &str, slug: &str, price: &str, stock: i32) -> Product {
        self.store
            .create_product(NewProduct {
                name: name.to_owned(),
                slug: slug.to_owned(),
                description: String::new(),
                price: dec(price),
                stock,
                sku: slug.to_uppercase(),
                category_ids: Vec::new(),
                images: Vec::new(),
            })
            .await
            .unwrap()
    }

    pub async fn seed_coupon(&self, code: &str, discount_type: DiscountType, value: &str) -> Coupon {
        self.seed_coupon_with(NewCoupon {
            code: CouponCode::parse(code).unwrap(),
            discount_type,
            value: dec(value),
            min_spend: Decimal::ZERO,
            expires_at: None,
            active: true,
        })
        .await
    }

    pub async fn seed_coupon_with(&self, coupon: NewCoupon) -> Coupon {
        self.store.create_coupon(coupon).await.unwrap()
    }

    pub async fn product(&self, id: ProductId) -> Product {
        self.store.product_by_id(id).await.unwrap().unwrap()
    }

    /// Registered, logged-out customer.
    pub async fn customer(&self, email: &str) -> User {
        AuthService::new(self.store.as_ref(), self.state.notifier())
            .register(email, TEST_PASSWORD, "Test Customer")
            .await
            .unwrap()
    }

    pub async fn admin(&self, email: &str) -> User {
        AuthService::new(self.store.as_ref(), self.state.notifier())
            .create_admin(email, TEST_PASSWORD, "Test Admin")
            .await
            .unwrap()
    }

    /// Log in through the API and return the session cookie.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                json!({ "email": email, "password": TEST_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {:?}", response.body);
        response.cookie.unwrap()
    }

    pub async fn order_count(&self) -> usize {
        self.store.list_orders(&Default::default()).await.unwrap().len()
    }
}

/// Parse a decimal literal.
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Order creation body for `email` with `(product, quantity)` lines.
pub fn order_body(lines: &[(ProductId, i32)], email: &str, coupon: Option<&str>) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, quantity)| json!({ "productId": id, "quantity": quantity }))
        .collect();

    json!({
        "items": items,
        "customer": {
            "name": "Ruby Tuesday",
            "email": email,
            "phone": "+1 555 0100",
            "address": {
                "line1": "12 Facet Lane",
                "city": "New York",
                "state": "NY",
                "postalCode": "10001",
                "country": "US"
            }
        },
        "couponCode": coupon,
        "paymentMethod": "card",
        "paymentReference": "cs_test_123"
    })
}

/// Assert the store-level invariant that a product never goes negative.
pub async fn assert_stock(store: &dyn Store, id: ProductId, expected: i32) {
    let product = store.product_by_id(id).await.unwrap().unwrap();
    assert_eq!(product.stock, expected, "stock for {}", product.name);
}
