//! `PostgreSQL` [`Store`] adapter.
//!
//! Queries are built at runtime with `sqlx::query_as` against private row
//! types, which are then converted into the domain models.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use aurelia_core::{
    CategoryId, CouponCode, CouponId, DiscountType, Email, OrderId, OrderStatus, PaymentMethod,
    ProductId, StockStatus, UserId, UserRole,
};

use super::{CatalogStore, CouponStore, OrderStore, RepositoryError, Store, UserStore};
use crate::models::{
    Category, Coupon, CouponRedemption, CustomerSnapshot, IssuedToken, NewCategory, NewCoupon,
    NewOrder, NewProduct, NewUser, Order, OrderFilter, OrderItem, Product, ProductFilter,
    ShippingAddress, StockUpdate, TokenKind, User,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool (used by the session store and migrations).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, message: impl Into<String>) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.into());
    }
    RepositoryError::Database(e)
}

fn parse_email(raw: &str) -> Result<Email, RepositoryError> {
    Email::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}

// =============================================================================
// Users
// =============================================================================

const USER_COLUMNS: &str = "id, email, name, role, email_verified, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: Email,
    name: String,
    role: UserRole,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: UserId::new(r.id),
            email: r.email,
            name: r.name,
            role: r.role,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct UserWithExpiryRow {
    #[sqlx(flatten)]
    user: UserRow,
    expires_at: DateTime<Utc>,
}

const fn token_columns(kind: TokenKind) -> (&'static str, &'static str) {
    match kind {
        TokenKind::EmailVerification => ("verification_token_hash", "verification_expires_at"),
        TokenKind::PasswordReset => ("reset_token_hash", "reset_expires_at"),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let (hash, expires_at) = new
            .verification
            .map(|t| (t.token_hash, t.expires_at))
            .unzip();

        let sql = format!(
            "INSERT INTO users (email, name, password_hash, role, \
                                verification_token_hash, verification_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.password_hash)
            .bind(new.role)
            .bind(hash)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "email already exists"))?;

        Ok(row.into())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn user_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let row: Option<UserWithHashRow> = sqlx::query_as(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE $1::user_role IS NULL OR role = $1 \
             ORDER BY created_at, id"
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(hash)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_token(
        &self,
        id: UserId,
        kind: TokenKind,
        token: Option<IssuedToken>,
    ) -> Result<(), RepositoryError> {
        let (hash_col, expiry_col) = token_columns(kind);
        let (hash, expires_at) = token.map(|t| (t.token_hash, t.expires_at)).unzip();

        let sql = format!("UPDATE users SET {hash_col} = $2, {expiry_col} = $3 WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn user_by_token(
        &self,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<(User, DateTime<Utc>)>, RepositoryError> {
        let (hash_col, expiry_col) = token_columns(kind);
        let sql = format!(
            "SELECT {USER_COLUMNS}, {expiry_col} AS expires_at FROM users \
             WHERE {hash_col} = $1 AND {expiry_col} IS NOT NULL"
        );
        let row: Option<UserWithExpiryRow> = sqlx::query_as(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.user.into(), r.expires_at)))
    }

    async fn wishlist(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY added_at, product_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(ProductId::new).collect())
    }

    async fn toggle_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed =
            sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        if removed == 0 {
            sqlx::query(
                "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed == 0)
    }
}

// =============================================================================
// Catalog
// =============================================================================

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.slug, p.description, p.price, p.stock, \
            p.sku, p.images, p.stock_status, p.created_at, p.updated_at, \
            ARRAY(SELECT pc.category_id FROM product_categories pc \
                  WHERE pc.product_id = p.id ORDER BY pc.category_id) AS category_ids \
     FROM products p";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(r.id),
            name: r.name,
            slug: r.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    stock: i32,
    sku: String,
    images: Vec<String>,
    stock_status: StockStatus,
    category_ids: Vec<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: ProductId::new(r.id),
            name: r.name,
            slug: r.slug,
            description: r.description,
            price: r.price,
            stock: r.stock,
            sku: r.sku,
            category_ids: r.category_ids.into_iter().map(CategoryId::new).collect(),
            images: r.images,
            stock_status: r.stock_status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

async fn fetch_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();
    let sql = format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)");
    let rows: Vec<ProductRow> = sqlx::query_as(&sql).bind(&raw).fetch_all(conn).await?;

    let mut by_id: HashMap<i32, Product> =
        rows.into_iter().map(|r| (r.id, r.into())).collect();
    Ok(raw.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> =
            sqlx::query_as("SELECT id, name, slug FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(
            "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
        )
        .bind(&new.name)
        .bind(&new.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("category slug '{}' already exists", new.slug)))?;
        Ok(row.into())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "{PRODUCT_SELECT} \
             WHERE ($1::text IS NULL OR EXISTS ( \
                       SELECT 1 FROM product_categories pc \
                       JOIN categories c ON c.id = pc.category_id \
                       WHERE pc.product_id = p.id AND c.slug = $1)) \
               AND (NOT $2 OR p.stock > 0) \
             ORDER BY p.name"
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(filter.category_slug.as_deref())
            .bind(filter.in_stock_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.slug = $1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_products(&mut conn, ids).await
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO products (name, slug, description, price, stock, sku, images, stock_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(&new.sku)
        .bind(&new.images)
        .bind(StockStatus::from_level(new.stock))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                format!(
                    "product slug '{}' or sku '{}' already exists",
                    new.slug, new.sku
                ),
            )
        })?;

        for category_id in &new.category_ids {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.is_foreign_key_violation()
                    {
                        return RepositoryError::Conflict(format!(
                            "unknown category {category_id}"
                        ));
                    }
                    RepositoryError::Database(e)
                })?;
        }

        let product = fetch_products(&mut tx, &[ProductId::new(id)])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(product)
    }

    async fn apply_stock_levels(
        &self,
        updates: &[StockUpdate],
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for update in in_lock_order(updates, |u| u.id) {
            let result = sqlx::query(
                "UPDATE products SET stock = $2, stock_status = $3, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(update.id)
            .bind(update.stock)
            .bind(StockStatus::from_level(update.stock))
            .execute(&mut *tx)
            .await?;

            // Dropping the transaction rolls back earlier rows in the batch.
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        let ids: Vec<ProductId> = updates.iter().map(|u| u.id).collect();
        let products = fetch_products(&mut tx, &ids).await?;
        tx.commit().await?;
        Ok(products)
    }
}

// =============================================================================
// Coupons
// =============================================================================

const COUPON_SELECT: &str = "SELECT c.id, c.code, c.discount_type, c.value, c.min_spend, \
            c.expires_at, c.active, c.created_at, \
            ARRAY(SELECT r.email FROM coupon_redemptions r \
                  WHERE r.coupon_id = c.id ORDER BY r.redeemed_at) AS used_by \
     FROM coupons c";

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: CouponCode,
    discount_type: DiscountType,
    value: Decimal,
    min_spend: Decimal,
    expires_at: Option<DateTime<Utc>>,
    active: bool,
    created_at: DateTime<Utc>,
    used_by: Vec<String>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let used_by = r
            .used_by
            .iter()
            .map(|raw| parse_email(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: CouponId::new(r.id),
            code: r.code,
            discount_type: r.discount_type,
            value: r.value,
            min_spend: r.min_spend,
            expires_at: r.expires_at,
            active: r.active,
            used_by,
            created_at: r.created_at,
        })
    }
}

impl PgStore {
    async fn coupon_by_id(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("{COUPON_SELECT} WHERE c.id = $1");
        let row: Option<CouponRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("{COUPON_SELECT} WHERE c.code = $1");
        let row: Option<CouponRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let sql = format!("{COUPON_SELECT} ORDER BY c.created_at DESC, c.id DESC");
        let rows: Vec<CouponRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_coupon(&self, new: NewCoupon) -> Result<Coupon, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO coupons (code, discount_type, value, min_spend, expires_at, active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(&new.code)
        .bind(new.discount_type)
        .bind(new.value)
        .bind(new.min_spend)
        .bind(new.expires_at)
        .bind(new.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("coupon code '{}' already exists", new.code)))?;

        self.coupon_by_id(CouponId::new(id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_coupon_active(
        &self,
        id: CouponId,
        active: bool,
    ) -> Result<Coupon, RepositoryError> {
        let result = sqlx::query("UPDATE coupons SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.coupon_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Orders
// =============================================================================

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, \
     customer_phone, shipping_address, subtotal, discount, total, coupon_code, \
     payment_method, payment_reference, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<i32>,
    customer_name: String,
    customer_email: Email,
    customer_phone: Option<String>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    coupon_code: Option<CouponCode>,
    payment_method: PaymentMethod,
    payment_reference: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: self.user_id.map(UserId::new),
            customer: CustomerSnapshot {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
                address: self.shipping_address.0,
            },
            items,
            subtotal: self.subtotal,
            discount: self.discount,
            total: self.total,
            coupon_code: self.coupon_code,
            payment_method: self.payment_method,
            payment_reference: self.payment_reference,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Attach line items to order rows, preserving row order.
async fn with_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let item_rows: Vec<OrderItemRow> = sqlx::query_as(
        "SELECT order_id, product_id, product_name, quantity, unit_price \
         FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for r in item_rows {
        items.entry(r.order_id).or_default().push(OrderItem {
            product_id: ProductId::new(r.product_id),
            product_name: r.product_name,
            quantity: r.quantity,
            unit_price: r.unit_price,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect())
}

/// Items sorted by product id, so every transaction that writes several
/// product rows locks them in the same order and two carts holding the same
/// products in different orders cannot deadlock.
fn in_lock_order<T>(items: &[T], product_id: impl Fn(&T) -> ProductId) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| product_id(*item));
    sorted
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(
        &self,
        order: NewOrder,
        redemption: Option<CouponRedemption>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for item in in_lock_order(&order.items, |i| i.product_id) {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(item.product_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(match available {
                    Some(available) => RepositoryError::InsufficientStock {
                        product_id: item.product_id,
                        requested: item.quantity,
                        available,
                    },
                    None => RepositoryError::NotFound,
                });
            }
        }

        if let Some(redemption) = &redemption {
            // The (coupon_id, email) key makes a second redemption a no-op;
            // concurrent transactions for the same email serialize on it.
            let inserted = sqlx::query(
                "INSERT INTO coupon_redemptions (coupon_id, email) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(redemption.coupon_id)
            .bind(&redemption.email)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                RepositoryError::Database(e)
            })?
            .rows_affected();

            if inserted == 0 {
                return Err(RepositoryError::CouponAlreadyRedeemed);
            }
        }

        let sql = format!(
            "INSERT INTO orders (order_number, user_id, customer_name, customer_email, \
                                 customer_phone, shipping_address, subtotal, discount, total, \
                                 coupon_code, payment_method, payment_reference) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row: OrderRow = sqlx::query_as(&sql)
            .bind(&order.order_number)
            .bind(order.user_id)
            .bind(&order.customer.name)
            .bind(&order.customer.email)
            .bind(&order.customer.phone)
            .bind(Json(&order.customer.address))
            .bind(order.subtotal)
            .bind(order.discount)
            .bind(order.total)
            .bind(&order.coupon_code)
            .bind(order.payment_method)
            .bind(&order.payment_reference)
            .fetch_one(&mut *tx)
            .await?;

        for (position, item) in (0_i32..).zip(&order.items) {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, product_name, \
                                          quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(row.id)
            .bind(position)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_order(order.items))
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(with_items(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::order_status IS NULL OR status = $1) \
               AND ($2::text IS NULL OR customer_email = $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(filter.status)
            .bind(filter.customer_email.as_ref().map(Email::as_str))
            .fetch_all(&mut *conn)
            .await?;
        with_items(&mut conn, rows).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.order_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(id),
            product_name: format!("product {id}"),
            quantity: 1,
            unit_price: Decimal::ONE,
        }
    }

    #[test]
    fn test_carts_in_any_order_lock_rows_identically() {
        let forward = [item(3), item(11), item(7)];
        let reverse = [item(7), item(11), item(3)];

        let ids = |items: &[OrderItem]| -> Vec<i32> {
            in_lock_order(items, |i| i.product_id)
                .iter()
                .map(|i| i.product_id.as_i32())
                .collect()
        };

        assert_eq!(ids(&forward), vec![3, 7, 11]);
        assert_eq!(ids(&forward), ids(&reverse));
    }

    #[test]
    fn test_stock_batches_lock_in_id_order() {
        let updates = [
            StockUpdate {
                id: ProductId::new(9),
                stock: 1,
            },
            StockUpdate {
                id: ProductId::new(2),
                stock: 4,
            },
        ];
        let order: Vec<i32> = in_lock_order(&updates, |u| u.id)
            .iter()
            .map(|u| u.id.as_i32())
            .collect();
        assert_eq!(order, vec![2, 9]);
    }
}
