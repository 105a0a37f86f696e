//! Back-office inventory listing and bulk stock updates.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use aurelia_core::{ProductId, StockStatus};

use crate::db::{RepositoryError, Store};
use crate::models::{Product, ProductFilter, StockUpdate};

/// Products at or below this level are flagged as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Errors from inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No inventory updates provided")]
    Empty,

    #[error("Stock level for product {0} cannot be negative")]
    NegativeStock(ProductId),

    #[error("Product not found")]
    ProductNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Inventory row for the back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub stock: i32,
    pub stock_status: StockStatus,
    pub low_stock: bool,
}

impl From<&Product> for InventoryItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            stock: product.stock,
            stock_status: product.stock_status,
            low_stock: product.stock <= LOW_STOCK_THRESHOLD,
        }
    }
}

/// Inventory operations over the store.
pub struct InventoryService<'a> {
    store: &'a dyn Store,
}

impl<'a> InventoryService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Every product with its stock level.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<InventoryItem>, InventoryError> {
        let products = self.store.list_products(&ProductFilter::default()).await?;
        Ok(products.iter().map(InventoryItem::from).collect())
    }

    /// Apply absolute stock levels as one batch.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Empty` or `InventoryError::NegativeStock`
    /// before touching the store, and `InventoryError::ProductNotFound` if any
    /// id is unknown (in which case no level is changed).
    #[instrument(skip_all, fields(count = updates.len()))]
    pub async fn bulk_update(
        &self,
        updates: &[StockUpdate],
    ) -> Result<Vec<InventoryItem>, InventoryError> {
        if updates.is_empty() {
            return Err(InventoryError::Empty);
        }
        if let Some(bad) = updates.iter().find(|u| u.stock < 0) {
            return Err(InventoryError::NegativeStock(bad.id));
        }

        let products = self
            .store
            .apply_stock_levels(updates)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => InventoryError::ProductNotFound,
                other => InventoryError::Repository(other),
            })?;

        tracing::info!(count = products.len(), "Inventory updated");
        Ok(products.iter().map(InventoryItem::from).collect())
    }
}
