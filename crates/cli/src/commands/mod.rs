pub mod catalog;
pub mod config;
pub mod doctor;
pub mod purge;
pub mod record;
pub mod suggest;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use cobuy_core::config::{AppConfig, LoadOptions};
use cobuy_core::recommender::{CatalogError, Recommender, StoreError};
use cobuy_core::{InterfaceError, ProductId, RecommendationError};
use cobuy_db::{connect_affinity_store, connect_catalog, CatalogConnectError, DbPool, SqlCatalog};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_DEPENDENCY: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            detail: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            detail: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a command error to its `error_class` by the typed error it wraps.
    ///
    /// Recommendation failures are reported through their [`InterfaceError`]: the
    /// message is the user-safe text and the full chain moves to `detail`, tagged
    /// with a correlation id that also appears in the log line.
    pub fn from_error(command: &str, error: &anyhow::Error) -> Self {
        let detail = format!("{error:#}");
        let Some(recommendation) = error.downcast_ref::<RecommendationError>() else {
            return Self::failure(command, error_class(error), detail, EXIT_DEPENDENCY);
        };

        let correlation_id = Uuid::new_v4().simple().to_string();
        let interface = recommendation.clone().into_interface(correlation_id.as_str());
        let class = match interface {
            InterfaceError::ServiceUnavailable { .. } => error_class(error),
            InterfaceError::Internal { .. } => "internal",
        };
        warn!(
            event_name = "cli.command.failed",
            command,
            correlation_id = %correlation_id,
            error_class = class,
            error = %detail,
            "command failed"
        );

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(class.to_string()),
            message: interface.user_message().to_string(),
            correlation_id: Some(correlation_id),
            detail: Some(detail),
            data: None,
        };
        Self { exit_code: EXIT_DEPENDENCY, output: serialize_payload(payload) }
    }
}

fn error_class(error: &anyhow::Error) -> &'static str {
    if let Some(error) = error.downcast_ref::<RecommendationError>() {
        return if error.is_store_unavailable() { "affinity_store" } else { "catalog" };
    }
    if error.downcast_ref::<StoreError>().is_some() {
        return "affinity_store";
    }
    if error.downcast_ref::<CatalogError>().is_some()
        || error.downcast_ref::<CatalogConnectError>().is_some()
    {
        return "catalog";
    }
    "runtime"
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn parse_product_ids(raw: &[String]) -> Vec<ProductId> {
    raw.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(ProductId::from)
        .collect()
}

/// Drives `future` to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    runtime.block_on(future)
}

/// Store, catalog, and engine wired from one configuration.
pub struct Services {
    pub recommender: Recommender,
    pub catalog: Arc<SqlCatalog>,
    pool: DbPool,
}

impl Services {
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let store = connect_affinity_store(&config.affinity)
            .await
            .context("affinity store connection failed")?;
        let pool = connect_catalog(&config.catalog).await.context("catalog database unavailable")?;
        let catalog = Arc::new(SqlCatalog::new(pool.clone()));
        let recommender = Recommender::new(store, catalog.clone(), config.recommender.clone());

        Ok(Self { recommender, catalog, pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;
    use cobuy_core::recommender::{CatalogError, StoreError};
    use cobuy_core::RecommendationError;
    use serde_json::Value;

    use super::{parse_product_ids, CommandResult};

    fn payload(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("valid json")
    }

    #[test]
    fn from_error_classifies_through_context() {
        let store = anyhow::Error::from(StoreError::Unavailable("refused".to_owned()))
            .context("affinity store connection failed");
        let result = CommandResult::from_error("record", &store);
        assert_eq!(result.exit_code, 3);
        assert_eq!(payload(&result)["error_class"], "affinity_store");
        assert!(payload(&result)["message"].as_str().unwrap_or_default().contains("refused"));

        let catalog: anyhow::Result<()> =
            Err(RecommendationError::from(CatalogError::Unavailable("locked".to_owned())))
                .context("suggest failed");
        let result = CommandResult::from_error("suggest", &catalog.unwrap_err());
        assert_eq!(payload(&result)["error_class"], "catalog");

        let other = anyhow::anyhow!("boom");
        assert_eq!(payload(&CommandResult::from_error("purge", &other))["error_class"], "runtime");
    }

    #[test]
    fn recommendation_failures_report_the_interface_message_with_a_correlation_id() {
        let store = anyhow::Error::from(RecommendationError::from(StoreError::Unavailable(
            "redis://:pw@cache refused".to_owned(),
        )))
        .context("suggest failed");
        let value = payload(&CommandResult::from_error("suggest", &store));

        assert_eq!(value["error_class"], "affinity_store");
        assert_eq!(
            value["message"],
            "Recommendations are temporarily unavailable. Please retry shortly."
        );
        assert_eq!(value["correlation_id"].as_str().map(str::len), Some(32));
        assert!(value["detail"].as_str().unwrap_or_default().contains("suggest failed"));

        let decode = anyhow::Error::from(RecommendationError::from(CatalogError::Decode(
            "bad price".to_owned(),
        )));
        let first = payload(&CommandResult::from_error("suggest", &decode));
        let second = payload(&CommandResult::from_error("suggest", &decode));

        assert_eq!(first["error_class"], "internal");
        assert_eq!(first["message"], "An unexpected internal error occurred.");
        assert_ne!(first["correlation_id"], second["correlation_id"]);
    }

    #[test]
    fn plain_failures_carry_no_correlation_id() {
        let value = payload(&CommandResult::from_error("purge", &anyhow::anyhow!("boom")));

        assert!(value.get("correlation_id").is_none());
        assert_eq!(value["message"], "boom");
    }

    #[test]
    fn success_omits_data_when_absent() {
        let result = CommandResult::success("purge", "done");
        let value = payload(&result);

        assert_eq!(value["status"], "ok");
        assert!(value.get("data").is_none());
        assert!(value["error_class"].is_null());
    }

    #[test]
    fn product_ids_are_trimmed_and_blank_ones_skipped() {
        let ids = parse_product_ids(&[" 1".to_owned(), "".to_owned(), "sku-2 ".to_owned()]);
        let ids: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();

        assert_eq!(ids, vec!["1", "sku-2"]);
    }
}
