//! Catalog domain types: categories, products and stock levels.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use aurelia_core::{CategoryId, ProductId, StockStatus};

/// A product category (e.g., "Rings", "Necklaces").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Unit price in the store currency.
    pub price: Decimal,
    /// Units on hand.
    pub stock: i32,
    pub sku: String,
    pub category_ids: Vec<CategoryId>,
    pub images: Vec<String>,
    /// Availability flag; recomputed from `stock` on admin inventory writes.
    pub stock_status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub sku: String,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Filters for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    /// Only products in the category with this slug.
    pub category_slug: Option<String>,
    /// Only products with stock on hand.
    pub in_stock_only: bool,
}

/// A single absolute stock level write from the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    pub id: ProductId,
    pub stock: i32,
}
