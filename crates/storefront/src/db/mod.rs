//! Document store for the storefront.
//!
//! Every entity (users, catalog, coupons, orders) lives behind the [`Store`]
//! port. Two adapters implement it:
//!
//! - [`postgres::PgStore`] - production adapter over `PostgreSQL`
//! - [`memory::MemoryStore`] - in-process adapter for tests and local demos
//!
//! ## Tables (`PostgreSQL`)
//!
//! - `users` - accounts, password hashes and one-time token digests
//! - `wishlist_items` - (user, product) pairs
//! - `categories`, `products`, `product_categories` - catalog
//! - `coupons`, `coupon_redemptions` - coupons and their used-by lists
//! - `orders`, `order_items` - orders with price snapshots
//! - `tower_sessions.session` - session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p aurelia-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use aurelia_core::{CouponCode, CouponId, Email, OrderId, OrderStatus, ProductId, UserId, UserRole};

use crate::models::{
    Category, Coupon, CouponRedemption, IssuedToken, NewCategory, NewCoupon, NewOrder,
    NewProduct, NewUser, Order, OrderFilter, Product, ProductFilter, StockUpdate, TokenKind, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Embedded storefront migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Errors returned by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A stock decrement would take a product below zero.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The coupon was already redeemed by this email.
    #[error("coupon already redeemed by this email")]
    CouponAlreadyRedeemed,
}

/// Account, token and wishlist documents.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user.
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError>;

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Get a user together with their password hash.
    async fn user_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// List users, optionally restricted to one role, oldest first.
    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    async fn mark_email_verified(&self, id: UserId) -> Result<(), RepositoryError>;

    /// Replace (or clear, with `None`) the user's token of the given kind.
    async fn set_token(
        &self,
        id: UserId,
        kind: TokenKind,
        token: Option<IssuedToken>,
    ) -> Result<(), RepositoryError>;

    /// Find the holder of a token digest and the token's expiry.
    async fn user_by_token(
        &self,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<(User, DateTime<Utc>)>, RepositoryError>;

    /// Product references in the user's wishlist, in insertion order.
    async fn wishlist(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError>;

    /// Remove the product if present, add it otherwise.
    ///
    /// Returns whether the product is in the wishlist afterwards.
    async fn toggle_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;
}

/// Category and product documents.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` on a duplicate slug.
    async fn create_category(&self, new: NewCategory) -> Result<Category, RepositoryError>;

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError>;

    /// Products for the given ids; unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` on a duplicate slug or SKU.
    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError>;

    /// Apply absolute stock levels in one transaction, deriving stock status.
    ///
    /// Any unknown id aborts the whole batch with `RepositoryError::NotFound`.
    async fn apply_stock_levels(
        &self,
        updates: &[StockUpdate],
    ) -> Result<Vec<Product>, RepositoryError>;
}

/// Coupon documents.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError>;

    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the code already exists.
    async fn create_coupon(&self, new: NewCoupon) -> Result<Coupon, RepositoryError>;

    async fn set_coupon_active(&self, id: CouponId, active: bool)
    -> Result<Coupon, RepositoryError>;

    async fn delete_coupon(&self, id: CouponId) -> Result<(), RepositoryError>;
}

/// Order documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write an order in one transaction together with its side effects.
    ///
    /// Within the transaction: the order and its items are inserted, each
    /// product's stock is decremented by the ordered quantity (failing with
    /// `RepositoryError::InsufficientStock` rather than going negative), and
    /// the coupon redemption, if any, is recorded (failing with
    /// `RepositoryError::CouponAlreadyRedeemed` if the email already used
    /// it). On any failure nothing is written.
    async fn place_order(
        &self,
        order: NewOrder,
        redemption: Option<CouponRedemption>,
    ) -> Result<Order, RepositoryError>;

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders matching the filter, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    /// Hard delete.
    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError>;
}

/// The complete document store.
#[async_trait]
pub trait Store: UserStore + CatalogStore + CouponStore + OrderStore {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

