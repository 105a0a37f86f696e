//! Customer wishlists.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use aurelia_core::{ProductId, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::Product;

/// Errors from wishlist operations.
#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("Product not found")]
    ProductNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistToggle {
    /// Whether the product is in the wishlist after the toggle.
    pub in_wishlist: bool,
    /// Wishlist product ids after the toggle.
    pub wishlist: Vec<ProductId>,
}

/// Wishlist operations over the store.
pub struct WishlistService<'a> {
    store: &'a dyn Store,
}

impl<'a> WishlistService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Add the product if absent, remove it if present.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::ProductNotFound` for unknown products.
    #[instrument(skip(self))]
    pub async fn toggle(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<WishlistToggle, WishlistError> {
        if self.store.product_by_id(product_id).await?.is_none() {
            return Err(WishlistError::ProductNotFound);
        }

        let in_wishlist = self.store.toggle_wishlist(user_id, product_id).await?;
        let wishlist = self.store.wishlist(user_id).await?;
        Ok(WishlistToggle {
            in_wishlist,
            wishlist,
        })
    }

    /// The user's wishlist as product documents; deleted products are skipped.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Repository` if the store fails.
    pub async fn products(&self, user_id: UserId) -> Result<Vec<Product>, WishlistError> {
        let ids = self.store.wishlist(user_id).await?;
        Ok(self.store.products_by_ids(&ids).await?)
    }
}
