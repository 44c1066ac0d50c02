use std::str::FromStr;
use std::time::Duration;

use cobuy_core::config::CatalogConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use crate::migrations;

pub type DbPool = sqlx::SqlitePool;

#[derive(Debug, Error)]
pub enum CatalogConnectError {
    #[error("catalog database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("catalog migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

/// Opens the catalog database and applies pending migrations.
///
/// In-memory databases live per connection, so they are pinned to one.
pub async fn connect_catalog(config: &CatalogConfig) -> Result<DbPool, CatalogConnectError> {
    let in_memory = config.database_url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.max_connections };

    let pool =
        connect_with_settings(&config.database_url, max_connections, config.timeout_secs).await?;
    migrations::run_pending(&pool).await?;

    info!(
        event_name = "catalog.database.ready",
        max_connections,
        in_memory,
        "catalog database connected and migrated"
    );
    Ok(pool)
}
