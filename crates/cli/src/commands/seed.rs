//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! categories:
//!   - { name: Rings, slug: rings }
//! products:
//!   - name: Opal Ring
//!     slug: opal-ring
//!     sku: RNG-OPAL-01
//!     price: "129.00"
//!     stock: 12
//!     categories: [rings]
//!     images: [/images/opal-ring.jpg]
//! coupons:
//!   - { code: WELCOME10, discountType: percentage, value: "10" }
//! ```
//!
//! Rows whose slug, SKU or code already exist are skipped, so the command
//! can be re-run after editing the file.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use aurelia_core::CurrencyCode;
use aurelia_storefront::db::{CatalogStore, PgStore, RepositoryError};
use aurelia_storefront::models::{NewCategory, NewProduct};
use aurelia_storefront::services::coupons::{CouponDraft, CouponError, CouponService};

use super::connect;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<NewCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub coupons: Vec<CouponDraft>,
}

/// Product entry; categories are referenced by slug.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub sku: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Counts reported after seeding.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

impl SeedSummary {
    fn record<T>(
        &mut self,
        kind: &str,
        key: &str,
        result: Result<T, RepositoryError>,
    ) -> Result<(), RepositoryError> {
        match result {
            Ok(_) => {
                self.inserted += 1;
                Ok(())
            }
            Err(RepositoryError::Conflict(reason)) => {
                warn!(kind, key, reason = %reason, "Skipping existing entry");
                self.skipped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse a seed file without touching the database.
///
/// # Errors
///
/// Returns an error if the YAML is malformed.
pub fn parse(content: &str) -> Result<SeedFile, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Seed categories, then products, then coupons.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a product names
/// an unknown category, or a database operation fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse(&content)?;
    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        coupons = seed.coupons.len(),
        "Parsed seed file"
    );

    let store = PgStore::new(connect().await?);
    let mut summary = SeedSummary::default();

    for category in seed.categories {
        let slug = category.slug.clone();
        let result = store.create_category(category).await;
        summary.record("category", &slug, result)?;
    }

    let categories = store.list_categories().await?;
    for product in seed.products {
        let mut category_ids = Vec::with_capacity(product.categories.len());
        for slug in &product.categories {
            let category = categories.iter().find(|c| &c.slug == slug).ok_or_else(|| {
                format!("Product {} references unknown category {slug}", product.slug)
            })?;
            category_ids.push(category.id);
        }

        let slug = product.slug.clone();
        let result = store
            .create_product(NewProduct {
                name: product.name,
                slug: product.slug,
                description: product.description,
                price: product.price,
                stock: product.stock,
                sku: product.sku,
                category_ids,
                images: product.images,
            })
            .await;
        summary.record("product", &slug, result)?;
    }

    let coupons = CouponService::new(&store, CurrencyCode::default());
    for draft in seed.coupons {
        let code = draft.code.clone().unwrap_or_default();
        match coupons.create(draft).await {
            Ok(_) => summary.inserted += 1,
            Err(CouponError::DuplicateCode) => {
                warn!(kind = "coupon", key = %code, "Skipping existing entry");
                summary.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Inserted: {}", summary.inserted);
    info!("  Skipped (already exist): {}", summary.skipped);
    Ok(())
}
