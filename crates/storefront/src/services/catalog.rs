//! Catalog reads with an in-process cache.
//!
//! Product listings are cached per filter for 5 minutes. Writes that change
//! stock (inventory updates, placed orders) call [`CatalogService::invalidate`].

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::{RepositoryError, Store};
use crate::models::{Category, Product, ProductFilter};

/// Errors from catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Catalog reads backed by the store.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    store: Arc<dyn Store>,
    products: Cache<ProductFilter, Arc<Vec<Product>>>,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let products = Cache::builder()
            .max_capacity(100)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { store, products }),
        }
    }

    /// Products matching `filter`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Arc<Vec<Product>>, CatalogError> {
        if let Some(products) = self.inner.products.get(filter).await {
            debug!("Cache hit for product listing");
            return Ok(products);
        }

        let products = Arc::new(self.inner.store.list_products(filter).await?);
        self.inner
            .products
            .insert(filter.clone(), Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no product has `slug`.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, CatalogError> {
        self.inner
            .store
            .product_by_slug(slug)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        Ok(self.inner.store.list_categories().await?)
    }

    /// Drop all cached listings.
    pub async fn invalidate(&self) {
        self.inner.products.invalidate_all();
        self.inner.products.run_pending_tasks().await;
        debug!("Product listing cache invalidated");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{CatalogStore, MemoryStore};
    use crate::models::{NewProduct, StockUpdate};

    fn necklace() -> NewProduct {
        NewProduct {
            name: "Gold Chain".to_owned(),
            slug: "gold-chain".to_owned(),
            description: String::new(),
            price: Decimal::new(25_000, 2),
            stock: 3,
            sku: "NK-001".to_owned(),
            category_ids: Vec::new(),
            images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_listing_is_cached_until_invalidated() {
        let store = Arc::new(MemoryStore::new());
        let catalog = CatalogService::new(store.clone());
        let product = store.create_product(necklace()).await.unwrap();
        let filter = ProductFilter::default();

        let first = catalog.list_products(&filter).await.unwrap();
        assert_eq!(first.first().unwrap().stock, 3);

        store
            .apply_stock_levels(&[StockUpdate {
                id: product.id,
                stock: 9,
            }])
            .await
            .unwrap();
        let cached = catalog.list_products(&filter).await.unwrap();
        assert_eq!(cached.first().unwrap().stock, 3);

        catalog.invalidate().await;
        let fresh = catalog.list_products(&filter).await.unwrap();
        assert_eq!(fresh.first().unwrap().stock, 9);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let catalog = CatalogService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            catalog.product_by_slug("missing").await,
            Err(CatalogError::NotFound)
        ));
    }
}
