use serde_json::json;

use crate::commands::{block_on, load_config, parse_product_ids, CommandResult, Services};

pub fn run(raw_ids: &[String], limit: Option<usize>, scores: bool) -> CommandResult {
    let config = match load_config("suggest") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let limit = limit.unwrap_or(config.recommender.default_limit);

    let result = block_on(async {
        let services = Services::open(&config).await?;
        let result = execute(&services, raw_ids, limit, scores).await;
        services.close().await;
        Ok(result)
    });

    result.unwrap_or_else(|error| CommandResult::from_error("suggest", &error))
}

pub async fn execute(
    services: &Services,
    raw_ids: &[String],
    limit: usize,
    scores: bool,
) -> CommandResult {
    let product_ids = parse_product_ids(raw_ids);

    let data = if scores {
        services
            .recommender
            .suggest_ids(&product_ids, limit)
            .await
            .map(|ranked| (ranked.len(), json!({ "ranked": ranked })))
    } else {
        services
            .recommender
            .suggest(&product_ids, limit)
            .await
            .map(|products| (products.len(), json!({ "products": products })))
    };

    match data {
        Ok((count, data)) => CommandResult::success_with_data(
            "suggest",
            format!("{count} suggestion(s) for {} product(s)", product_ids.len()),
            Some(data),
        ),
        Err(error) => CommandResult::from_error("suggest", &error.into()),
    }
}
