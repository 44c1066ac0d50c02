use cobuy_core::{Product, ProductId};
use rust_decimal::Decimal;
use serde_json::json;

use crate::commands::{block_on, load_config, CommandResult, Services, EXIT_CONFIG};

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub available: bool,
}

impl NewProduct {
    fn validate(self) -> Result<Product, CommandResult> {
        let invalid = |message: &str| {
            CommandResult::failure("catalog_add", "invalid_input", message, EXIT_CONFIG)
        };

        let id = self.id.trim();
        if id.is_empty() {
            return Err(invalid("product id is empty"));
        }
        if self.price.is_sign_negative() {
            return Err(invalid("price is negative"));
        }

        Ok(Product {
            id: ProductId::from(id),
            name: self.name,
            slug: self.slug,
            price: self.price,
            available: self.available,
        })
    }
}

pub fn add(new_product: NewProduct) -> CommandResult {
    let config = match load_config("catalog_add") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let product = match new_product.validate() {
        Ok(product) => product,
        Err(result) => return result,
    };

    let result = block_on(async {
        let services = Services::open(&config).await?;
        let result = save(&services, product).await;
        services.close().await;
        Ok(result)
    });

    result.unwrap_or_else(|error| CommandResult::from_error("catalog_add", &error))
}

pub async fn execute_add(services: &Services, new_product: NewProduct) -> CommandResult {
    match new_product.validate() {
        Ok(product) => save(services, product).await,
        Err(result) => result,
    }
}

async fn save(services: &Services, product: Product) -> CommandResult {
    match services.catalog.save(&product).await {
        Ok(()) => CommandResult::success_with_data(
            "catalog_add",
            format!("saved product {}", product.id),
            Some(json!({ "product": product })),
        ),
        Err(error) => CommandResult::from_error("catalog_add", &error.into()),
    }
}

pub fn remove(raw_id: &str) -> CommandResult {
    let config = match load_config("catalog_remove") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let result = block_on(async {
        let services = Services::open(&config).await?;
        let result = execute_remove(&services, raw_id).await;
        services.close().await;
        Ok(result)
    });

    result.unwrap_or_else(|error| CommandResult::from_error("catalog_remove", &error))
}

/// Removes the catalog row and the product's own affinity key. Scores other
/// products hold for it stay until those keys are purged.
pub async fn execute_remove(services: &Services, raw_id: &str) -> CommandResult {
    let product_id = ProductId::from(raw_id.trim());

    let removed = match services.catalog.delete(&product_id).await {
        Ok(removed) => removed,
        Err(error) => return CommandResult::from_error("catalog_remove", &error.into()),
    };
    let purged =
        match services.recommender.purge_products(std::slice::from_ref(&product_id)).await {
            Ok(keys) => keys,
            Err(error) => return CommandResult::from_error("catalog_remove", &error.into()),
        };

    let message = if removed {
        format!("removed product {product_id}")
    } else {
        format!("product {product_id} was not in the catalog")
    };
    CommandResult::success_with_data(
        "catalog_remove",
        message,
        Some(json!({ "removed": removed, "keys_deleted": purged })),
    )
}
