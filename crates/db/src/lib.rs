pub mod affinity;
pub mod catalog;
pub mod connection;
pub mod migrations;

pub use affinity::{connect_affinity_store, RedisAffinityStore};
pub use catalog::SqlCatalog;
pub use connection::{connect, connect_catalog, connect_with_settings, CatalogConnectError, DbPool};
