use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::{Product, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("catalog decode error: {0}")]
    Decode(String),
}

/// Read access to the product catalog owned by the surrounding application.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolves the live products among `ids`. The result is unordered and may be
    /// shorter than `ids` when products were removed.
    async fn resolve_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError>;

    /// Every product id currently known to the catalog.
    async fn list_product_ids(&self) -> Result<Vec<ProductId>, CatalogError>;
}
