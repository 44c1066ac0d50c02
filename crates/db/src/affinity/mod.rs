//! Affinity store adapters selected from configuration.

mod redis_store;

use std::sync::Arc;

use cobuy_core::config::AffinityStoreConfig;
use cobuy_core::recommender::{AffinityStore, InMemoryAffinityStore, StoreError};
use secrecy::ExposeSecret;
use tracing::info;

pub use redis_store::RedisAffinityStore;

/// Opens the store named by `config.url`: `memory` for the in-process store,
/// otherwise a Redis connection manager.
pub async fn connect_affinity_store(
    config: &AffinityStoreConfig,
) -> Result<Arc<dyn AffinityStore>, StoreError> {
    if config.is_memory() {
        info!(event_name = "affinity.store.connected", backend = "memory", "affinity store ready");
        return Ok(Arc::new(InMemoryAffinityStore::new()));
    }

    let store = RedisAffinityStore::connect(
        config.url.expose_secret().trim(),
        config.timeout_ms,
        config.max_retries,
    )
    .await?;
    info!(
        event_name = "affinity.store.connected",
        backend = "redis",
        timeout_ms = config.timeout_ms,
        max_retries = config.max_retries,
        "affinity store ready"
    );
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use cobuy_core::config::{AffinityStoreConfig, MEMORY_STORE_URL};
    use cobuy_core::recommender::StoreError;

    use super::connect_affinity_store;

    fn config(url: &str) -> AffinityStoreConfig {
        AffinityStoreConfig { url: url.to_owned().into(), timeout_ms: 200, max_retries: 0 }
    }

    #[tokio::test]
    async fn memory_url_selects_in_process_store() {
        let store = connect_affinity_store(&config(MEMORY_STORE_URL)).await.expect("memory store");

        assert_eq!(store.increment("product:1:purchased_with", "2", 1.0).await, Ok(1.0));
        store.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn unreachable_redis_reports_store_failure() {
        let error = match connect_affinity_store(&config("redis://127.0.0.1:1/0")).await {
            Ok(_) => panic!("nothing listens on port 1"),
            Err(error) => error,
        };

        assert!(matches!(error, StoreError::Unavailable(_) | StoreError::Timeout { .. }));
    }
}
