//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::models::{Category, Product, ProductFilter};
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category_slug: query
                .category
                .map(|c| c.trim().to_owned())
                .filter(|c| !c.is_empty()),
            in_stock_only: query.in_stock,
        }
    }
}

/// List products.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = state.catalog().list_products(&query.into()).await?;
    Ok(Json(Vec::clone(&products)))
}

/// Product detail by slug.
#[instrument(skip(state))]
pub async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().product_by_slug(&slug).await?))
}

/// List categories.
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.catalog().list_categories().await?))
}
