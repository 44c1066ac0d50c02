use std::str::FromStr;

use async_trait::async_trait;
use cobuy_core::domain::product::{Product, ProductId};
use cobuy_core::recommender::{CatalogError, CatalogLookup};
use rust_decimal::Decimal;
use sqlx::Row;

use crate::DbPool;

/// Product catalog backed by the `product` table.
pub struct SqlCatalog {
    pool: DbPool,
}

impl SqlCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, product: &Product) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT INTO product (id, name, slug, price, available)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 slug = excluded.slug,
                 price = excluded.price,
                 available = excluded.available",
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.slug)
        .bind(product.price.to_string())
        .bind(product.available)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    pub async fn delete(&self, id: &ProductId) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM product WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(result.rows_affected() > 0)
    }
}

fn unavailable(error: sqlx::Error) -> CatalogError {
    CatalogError::Unavailable(error.to_string())
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, CatalogError> {
    let id: String = row.try_get("id").map_err(|e| CatalogError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| CatalogError::Decode(e.to_string()))?;
    let slug: String = row.try_get("slug").map_err(|e| CatalogError::Decode(e.to_string()))?;
    let price: String = row.try_get("price").map_err(|e| CatalogError::Decode(e.to_string()))?;
    let available: bool =
        row.try_get("available").map_err(|e| CatalogError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price)
        .map_err(|e| CatalogError::Decode(format!("product {id} has invalid price `{price}`: {e}")))?;

    Ok(Product { id: ProductId(id), name, slug, price, available })
}

#[async_trait]
impl CatalogLookup for SqlCatalog {
    async fn resolve_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, slug, price, available FROM product WHERE id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(unavailable)?;
        rows.iter().map(row_to_product).collect()
    }

    async fn list_product_ids(&self) -> Result<Vec<ProductId>, CatalogError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM product ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        Ok(rows.into_iter().map(|(id,)| ProductId(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use cobuy_core::domain::product::{Product, ProductId};
    use cobuy_core::recommender::{CatalogError, CatalogLookup};
    use rust_decimal::Decimal;

    use super::SqlCatalog;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlCatalog {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlCatalog::new(pool)
    }

    fn product(id: u64, available: bool) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            price: Decimal::new(1250 + id as i64, 2),
            available,
        }
    }

    #[tokio::test]
    async fn resolve_returns_only_known_products() {
        let catalog = setup().await;
        for id in 1..=3 {
            catalog.save(&product(id, true)).await.expect("save");
        }

        let ids = [ProductId::from(3), ProductId::from(9), ProductId::from(1)];
        let mut resolved = catalog.resolve_products(&ids).await.expect("resolve");
        resolved.sort_by(|a, b| a.id.cmp(&b.id));

        let found: Vec<&str> = resolved.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(found, vec!["1", "3"]);
        assert_eq!(resolved[0].price, Decimal::new(1251, 2));
    }

    #[tokio::test]
    async fn resolve_does_not_filter_unavailable_products() {
        let catalog = setup().await;
        catalog.save(&product(7, false)).await.expect("save");

        let resolved = catalog.resolve_products(&[ProductId::from(7)]).await.expect("resolve");

        assert_eq!(resolved.len(), 1);
        assert!(!resolved[0].available);
    }

    #[tokio::test]
    async fn resolve_with_no_ids_is_empty() {
        let catalog = setup().await;
        assert!(catalog.resolve_products(&[]).await.expect("resolve").is_empty());
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let catalog = setup().await;
        catalog.save(&product(4, true)).await.expect("save");

        let mut renamed = product(4, false);
        renamed.name = "Renamed".to_owned();
        catalog.save(&renamed).await.expect("upsert");

        let resolved = catalog.resolve_products(&[ProductId::from(4)]).await.expect("resolve");
        assert_eq!(resolved, vec![renamed]);
    }

    #[tokio::test]
    async fn list_and_delete_product_ids() {
        let catalog = setup().await;
        for id in [2, 1, 3] {
            catalog.save(&product(id, true)).await.expect("save");
        }

        assert!(catalog.delete(&ProductId::from(2)).await.expect("delete"));
        assert!(!catalog.delete(&ProductId::from(2)).await.expect("second delete"));

        let ids = catalog.list_product_ids().await.expect("list");
        assert_eq!(ids, vec![ProductId::from(1), ProductId::from(3)]);
    }

    #[tokio::test]
    async fn invalid_price_is_a_decode_error() {
        let catalog = setup().await;
        sqlx::query(
            "INSERT INTO product (id, name, slug, price, available)
             VALUES ('8', 'Broken', 'broken', 'twelve', 1)",
        )
        .execute(&catalog.pool)
        .await
        .expect("insert");

        let error = catalog.resolve_products(&[ProductId::from(8)]).await.expect_err("decode");
        assert!(matches!(error, CatalogError::Decode(_)));
    }
}
