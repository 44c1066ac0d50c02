use std::collections::HashSet;

use cobuy_core::CompletedOrder;
use serde_json::json;

use crate::commands::{block_on, load_config, parse_product_ids, CommandResult, Services};

pub fn run(order_id: Option<&str>, raw_ids: &[String]) -> CommandResult {
    let config = match load_config("record") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let result = block_on(async {
        let services = Services::open(&config).await?;
        let result = execute(&services, order_id, raw_ids).await;
        services.close().await;
        Ok(result)
    });

    result.unwrap_or_else(|error| CommandResult::from_error("record", &error))
}

pub async fn execute(
    services: &Services,
    order_id: Option<&str>,
    raw_ids: &[String],
) -> CommandResult {
    let product_ids = parse_product_ids(raw_ids);
    let distinct = product_ids.iter().collect::<HashSet<_>>().len();

    let recorded = match order_id {
        Some(order_id) => {
            let order =
                CompletedOrder { order_id: order_id.to_owned(), product_ids: product_ids.clone() };
            services.recommender.record_order(&order).await
        }
        None => services.recommender.record_co_purchase(&product_ids).await,
    };

    match recorded {
        Ok(()) if distinct < 2 => CommandResult::success_with_data(
            "record",
            "fewer than two distinct products; nothing recorded",
            Some(json!({ "distinct_products": distinct })),
        ),
        Ok(()) => CommandResult::success_with_data(
            "record",
            format!("recorded co-purchase of {distinct} products"),
            Some(json!({ "distinct_products": distinct, "order_id": order_id })),
        ),
        Err(error) => CommandResult::from_error("record", &error.into()),
    }
}
