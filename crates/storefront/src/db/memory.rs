//! In-process [`Store`] adapter.
//!
//! Holds every document behind a single async mutex, so each operation
//! (including [`OrderStore::place_order`]) is atomic with respect to the
//! others. Used by the test suites and for running the API without a
//! database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use aurelia_core::{
    CategoryId, CouponCode, CouponId, Email, OrderId, OrderStatus, ProductId, StockStatus, UserId,
    UserRole,
};

use super::{CatalogStore, CouponStore, OrderStore, RepositoryError, Store, UserStore};
use crate::models::{
    Category, Coupon, CouponRedemption, IssuedToken, NewCategory, NewCoupon, NewOrder,
    NewProduct, NewUser, Order, OrderFilter, Product, ProductFilter, StockUpdate, TokenKind, User,
};

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Documents>,
}

#[derive(Default)]
struct Documents {
    sequence: i32,
    users: BTreeMap<UserId, UserRecord>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    coupons: BTreeMap<CouponId, Coupon>,
    orders: BTreeMap<OrderId, Order>,
}

struct UserRecord {
    user: User,
    password_hash: String,
    verification: Option<IssuedToken>,
    password_reset: Option<IssuedToken>,
    wishlist: Vec<ProductId>,
}

impl UserRecord {
    const fn token(&self, kind: TokenKind) -> Option<&IssuedToken> {
        match kind {
            TokenKind::EmailVerification => self.verification.as_ref(),
            TokenKind::PasswordReset => self.password_reset.as_ref(),
        }
    }
}

impl Documents {
    fn next_id(&mut self) -> i32 {
        self.sequence += 1;
        self.sequence
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut UserRecord, RepositoryError> {
        self.users.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut docs = self.inner.lock().await;
        if docs.users.values().any(|r| r.user.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(docs.next_id()),
            email: new.email,
            name: new.name,
            role: new.role,
            email_verified: false,
            created_at: now,
            updated_at: now,
        };
        docs.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new.password_hash,
                verification: new.verification,
                password_reset: None,
                wishlist: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.users.get(&id).map(|r| r.user.clone()))
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn user_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs
            .users
            .values()
            .filter(|r| role.is_none_or(|role| r.user.role == role))
            .map(|r| r.user.clone())
            .collect())
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut docs = self.inner.lock().await;
        let record = docs.user_mut(id)?;
        hash.clone_into(&mut record.password_hash);
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_email_verified(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut docs = self.inner.lock().await;
        let record = docs.user_mut(id)?;
        record.user.email_verified = true;
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_token(
        &self,
        id: UserId,
        kind: TokenKind,
        token: Option<IssuedToken>,
    ) -> Result<(), RepositoryError> {
        let mut docs = self.inner.lock().await;
        let record = docs.user_mut(id)?;
        match kind {
            TokenKind::EmailVerification => record.verification = token,
            TokenKind::PasswordReset => record.password_reset = token,
        }
        Ok(())
    }

    async fn user_by_token(
        &self,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<(User, DateTime<Utc>)>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.users.values().find_map(|r| {
            r.token(kind)
                .filter(|t| t.token_hash == token_hash)
                .map(|t| (r.user.clone(), t.expires_at))
        }))
    }

    async fn wishlist(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let docs = self.inner.lock().await;
        docs.users
            .get(&user_id)
            .map(|r| r.wishlist.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn toggle_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.inner.lock().await;
        let record = docs.user_mut(user_id)?;
        if let Some(pos) = record.wishlist.iter().position(|id| *id == product_id) {
            record.wishlist.remove(pos);
            Ok(false)
        } else {
            record.wishlist.push(product_id);
            Ok(true)
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let docs = self.inner.lock().await;
        let mut categories: Vec<Category> = docs.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, new: NewCategory) -> Result<Category, RepositoryError> {
        let mut docs = self.inner.lock().await;
        if docs.categories.values().any(|c| c.slug == new.slug) {
            return Err(RepositoryError::Conflict(format!(
                "category slug '{}' already exists",
                new.slug
            )));
        }
        let category = Category {
            id: CategoryId::new(docs.next_id()),
            name: new.name,
            slug: new.slug,
        };
        docs.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let docs = self.inner.lock().await;
        let category_id = match &filter.category_slug {
            Some(slug) => match docs.categories.values().find(|c| &c.slug == slug) {
                Some(category) => Some(category.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut products: Vec<Product> = docs
            .products
            .values()
            .filter(|p| category_id.is_none_or(|id| p.category_ids.contains(&id)))
            .filter(|p| !filter.in_stock_only || p.stock > 0)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.products.get(&id).cloned())
    }

    async fn product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| docs.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let mut docs = self.inner.lock().await;
        if docs
            .products
            .values()
            .any(|p| p.slug == new.slug || p.sku == new.sku)
        {
            return Err(RepositoryError::Conflict(format!(
                "product slug '{}' or sku '{}' already exists",
                new.slug, new.sku
            )));
        }
        if let Some(missing) = new
            .category_ids
            .iter()
            .find(|id| !docs.categories.contains_key(id))
        {
            return Err(RepositoryError::Conflict(format!(
                "unknown category {missing}"
            )));
        }

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(docs.next_id()),
            name: new.name,
            slug: new.slug,
            description: new.description,
            price: new.price,
            stock: new.stock,
            sku: new.sku,
            category_ids: new.category_ids,
            images: new.images,
            stock_status: StockStatus::from_level(new.stock),
            created_at: now,
            updated_at: now,
        };
        docs.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn apply_stock_levels(
        &self,
        updates: &[StockUpdate],
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut docs = self.inner.lock().await;
        if updates.iter().any(|u| !docs.products.contains_key(&u.id)) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            if let Some(product) = docs.products.get_mut(&update.id) {
                product.stock = update.stock;
                product.stock_status = StockStatus::from_level(update.stock);
                product.updated_at = now;
                updated.push(product.clone());
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl CouponStore for MemoryStore {
    async fn coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.coupons.values().find(|c| &c.code == code).cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let docs = self.inner.lock().await;
        let mut coupons: Vec<Coupon> = docs.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(coupons)
    }

    async fn create_coupon(&self, new: NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut docs = self.inner.lock().await;
        if docs.coupons.values().any(|c| c.code == new.code) {
            return Err(RepositoryError::Conflict(format!(
                "coupon code '{}' already exists",
                new.code
            )));
        }
        let coupon = Coupon {
            id: CouponId::new(docs.next_id()),
            code: new.code,
            discount_type: new.discount_type,
            value: new.value,
            min_spend: new.min_spend,
            expires_at: new.expires_at,
            active: new.active,
            used_by: Vec::new(),
            created_at: Utc::now(),
        };
        docs.coupons.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    async fn set_coupon_active(
        &self,
        id: CouponId,
        active: bool,
    ) -> Result<Coupon, RepositoryError> {
        let mut docs = self.inner.lock().await;
        let coupon = docs.coupons.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        coupon.active = active;
        Ok(coupon.clone())
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), RepositoryError> {
        let mut docs = self.inner.lock().await;
        docs.coupons
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(
        &self,
        order: NewOrder,
        redemption: Option<CouponRedemption>,
    ) -> Result<Order, RepositoryError> {
        let mut docs = self.inner.lock().await;

        // Check every precondition before touching anything.
        for item in &order.items {
            let product = docs
                .products
                .get(&item.product_id)
                .ok_or(RepositoryError::NotFound)?;
            if product.stock < item.quantity {
                return Err(RepositoryError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock,
                });
            }
        }
        if let Some(redemption) = &redemption {
            let coupon = docs
                .coupons
                .get(&redemption.coupon_id)
                .ok_or(RepositoryError::NotFound)?;
            if coupon.is_used_by(&redemption.email) {
                return Err(RepositoryError::CouponAlreadyRedeemed);
            }
        }

        let now = Utc::now();
        for item in &order.items {
            if let Some(product) = docs.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
                product.updated_at = now;
            }
        }
        if let Some(redemption) = redemption
            && let Some(coupon) = docs.coupons.get_mut(&redemption.coupon_id)
        {
            coupon.used_by.push(redemption.email);
        }

        let placed = Order {
            id: OrderId::new(docs.next_id()),
            order_number: order.order_number,
            user_id: order.user_id,
            customer: order.customer,
            items: order.items,
            subtotal: order.subtotal,
            discount: order.discount,
            total: order.total,
            coupon_code: order.coupon_code,
            payment_method: order.payment_method,
            payment_reference: order.payment_reference,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        docs.orders.insert(placed.id, placed.clone());
        Ok(placed)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let docs = self.inner.lock().await;
        Ok(docs.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let docs = self.inner.lock().await;
        let mut orders: Vec<Order> = docs
            .orders
            .values()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| {
                filter
                    .customer_email
                    .as_ref()
                    .is_none_or(|email| &o.customer.email == email)
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut docs = self.inner.lock().await;
        let order = docs.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut docs = self.inner.lock().await;
        docs.orders
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn ring(slug: &str, stock: i32) -> NewProduct {
        NewProduct {
            name: format!("Ring {slug}"),
            slug: slug.to_owned(),
            description: String::new(),
            price: Decimal::new(12_000, 2),
            stock,
            sku: format!("SKU-{slug}"),
            category_ids: Vec::new(),
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_product_derives_stock_status() {
        let store = MemoryStore::new();
        let sold_out = store.create_product(ring("a", 0)).await.unwrap();
        assert_eq!(sold_out.stock_status, StockStatus::OutOfStock);
        let available = store.create_product(ring("b", 2)).await.unwrap();
        assert_eq!(available.stock_status, StockStatus::InStock);
    }

    #[tokio::test]
    async fn test_create_product_rejects_duplicate_slug() {
        let store = MemoryStore::new();
        store.create_product(ring("a", 1)).await.unwrap();
        let err = store.create_product(ring("a", 1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_apply_stock_levels_unknown_id_changes_nothing() {
        let store = MemoryStore::new();
        let product = store.create_product(ring("a", 4)).await.unwrap();
        let updates = [
            StockUpdate {
                id: product.id,
                stock: 9,
            },
            StockUpdate {
                id: ProductId::new(999),
                stock: 1,
            },
        ];
        let err = store.apply_stock_levels(&updates).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        let unchanged = store.product_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.stock, 4);
    }

    #[tokio::test]
    async fn test_list_products_unknown_category_is_empty() {
        let store = MemoryStore::new();
        store.create_product(ring("a", 1)).await.unwrap();
        let filter = ProductFilter {
            category_slug: Some("bracelets".to_owned()),
            in_stock_only: false,
        };
        assert!(store.list_products(&filter).await.unwrap().is_empty());
    }
}
