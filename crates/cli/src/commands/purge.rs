use serde_json::json;

use crate::commands::{block_on, load_config, parse_product_ids, CommandResult, Services};

pub fn run(raw_ids: &[String]) -> CommandResult {
    let config = match load_config("purge") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let result = block_on(async {
        let services = Services::open(&config).await?;
        let result = execute(&services, raw_ids).await;
        services.close().await;
        Ok(result)
    });

    result.unwrap_or_else(|error| CommandResult::from_error("purge", &error))
}

/// Purges the given products, or every affinity key when `raw_ids` is empty.
pub async fn execute(services: &Services, raw_ids: &[String]) -> CommandResult {
    let product_ids = parse_product_ids(raw_ids);

    let purged = if product_ids.is_empty() {
        services.recommender.purge().await
    } else {
        services.recommender.purge_products(&product_ids).await
    };

    match purged {
        Ok(keys) => CommandResult::success_with_data(
            "purge",
            format!("purged {keys} affinity key(s)"),
            Some(json!({ "keys_deleted": keys })),
        ),
        Err(error) => CommandResult::from_error("purge", &error.into()),
    }
}
