//! In-process collaborators: a sorted-set store and a product catalog backed by
//! hash maps. Used by tests and by the `memory` affinity backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::catalog::{CatalogError, CatalogLookup};
use super::store::{AffinityStore, ScoredMember, StoreError};
use crate::domain::product::{Product, ProductId};

#[derive(Default)]
pub struct InMemoryAffinityStore {
    sets: RwLock<HashMap<String, HashMap<String, f64>>>,
    offline: AtomicBool,
}

impl InMemoryAffinityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn score(&self, key: &str, member: &str) -> Option<f64> {
        let sets = self.sets.read().await;
        sets.get(key).and_then(|set| set.get(member).copied())
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.sets.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sets.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AffinityStore for InMemoryAffinityStore {
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError> {
        self.ensure_online()?;
        let mut sets = self.sets.write().await;
        let score = sets.entry(key.to_owned()).or_default().entry(member.to_owned()).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn merge_sum(&self, destination: &str, sources: &[String]) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut sets = self.sets.write().await;

        let mut merged: HashMap<String, f64> = HashMap::new();
        for source in sources {
            if let Some(set) = sets.get(source) {
                for (member, score) in set {
                    *merged.entry(member.clone()).or_insert(0.0) += score;
                }
            }
        }

        // an empty union leaves no key behind, as in redis
        if merged.is_empty() {
            sets.remove(destination);
        } else {
            sets.insert(destination.to_owned(), merged);
        }
        Ok(())
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut sets = self.sets.write().await;

        let now_empty = match sets.get_mut(key) {
            Some(set) => {
                for member in members {
                    set.remove(member);
                }
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            sets.remove(key);
        }
        Ok(())
    }

    async fn range_descending(
        &self,
        key: &str,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.ensure_online()?;
        let sets = self.sets.read().await;

        let Some(set) = sets.get(key) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<ScoredMember> =
            set.iter().map(|(member, score)| (member.clone(), *score)).collect();
        entries.sort_by(|(a_member, a_score), (b_member, b_score)| {
            b_score.total_cmp(a_score).then_with(|| a_member.cmp(b_member))
        });

        Ok(entries.into_iter().skip(offset).take(count.unwrap_or(usize::MAX)).collect())
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.sets.write().await.remove(key);
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str, suffix: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_online()?;
        let sets = self.sets.read().await;
        Ok(sets
            .keys()
            .filter(|key| {
                key.len() >= prefix.len() + suffix.len()
                    && key.starts_with(prefix)
                    && key.ends_with(suffix)
            })
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_online()
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let catalog = Self::default();
        for product in products {
            catalog.save(product).await;
        }
        catalog
    }

    pub async fn save(&self, product: Product) {
        self.products.write().await.insert(product.id.clone(), product);
    }

    pub async fn remove(&self, id: &ProductId) -> Option<Product> {
        self.products.write().await.remove(id)
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn resolve_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, CatalogError> {
        let products = self.products.read().await;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn list_product_ids(&self) -> Result<Vec<ProductId>, CatalogError> {
        let mut ids: Vec<ProductId> = self.products.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{InMemoryAffinityStore, InMemoryCatalog};
    use crate::domain::product::{Product, ProductId};
    use crate::recommender::catalog::CatalogLookup;
    use crate::recommender::store::{AffinityStore, StoreError};

    #[tokio::test]
    async fn increment_creates_key_and_accumulates() {
        let store = InMemoryAffinityStore::new();

        assert_eq!(store.increment("a", "x", 1.0).await.expect("increment"), 1.0);
        assert_eq!(store.increment("a", "x", 2.0).await.expect("increment"), 3.0);
        assert_eq!(store.score("a", "x").await, Some(3.0));
    }

    #[tokio::test]
    async fn merge_sum_adds_shared_members_and_replaces_destination() {
        let store = InMemoryAffinityStore::new();
        store.increment("a", "x", 2.0).await.expect("increment");
        store.increment("a", "y", 1.0).await.expect("increment");
        store.increment("b", "x", 3.0).await.expect("increment");
        store.increment("dest", "stale", 9.0).await.expect("increment");

        store
            .merge_sum("dest", &["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .expect("merge");

        let range = store.range_descending("dest", 0, None).await.expect("range");
        assert_eq!(range, vec![("x".to_string(), 5.0), ("y".to_string(), 1.0)]);
    }

    #[tokio::test]
    async fn removing_last_member_drops_the_key() {
        let store = InMemoryAffinityStore::new();
        store.increment("a", "x", 1.0).await.expect("increment");

        store.remove_members("a", &["x".to_string()]).await.expect("remove");

        assert!(!store.contains_key("a").await);
    }

    #[tokio::test]
    async fn range_honours_offset_and_count() {
        let store = InMemoryAffinityStore::new();
        for (member, score) in [("a", 1.0), ("b", 3.0), ("c", 2.0)] {
            store.increment("k", member, score).await.expect("increment");
        }

        let page = store.range_descending("k", 1, Some(1)).await.expect("range");
        assert_eq!(page, vec![("c".to_string(), 2.0)]);
        assert!(store.range_descending("missing", 0, None).await.expect("range").is_empty());
    }

    #[tokio::test]
    async fn scan_keys_matches_prefix_and_suffix() {
        let store = InMemoryAffinityStore::new();
        for key in ["p:1:with", "p:22:with", "p:3:other", "q:1:with", "p:with"] {
            store.increment(key, "x", 1.0).await.expect("increment");
        }

        let mut keys = store.scan_keys("p:", ":with").await.expect("scan");
        keys.sort();

        assert_eq!(keys, vec!["p:1:with".to_string(), "p:22:with".to_string()]);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryAffinityStore::new();
        store.set_offline(true);

        let error = store.ping().await.expect_err("offline ping should fail");
        assert!(matches!(error, StoreError::Unavailable(_)));

        store.set_offline(false);
        store.ping().await.expect("online ping");
    }

    #[tokio::test]
    async fn catalog_resolves_known_ids_only() {
        let catalog = InMemoryCatalog::with_products([Product {
            id: ProductId::from(1),
            name: "Green tea".to_string(),
            slug: "green-tea".to_string(),
            price: Decimal::new(3050, 2),
            available: true,
        }])
        .await;

        let resolved = catalog
            .resolve_products(&[ProductId::from(1), ProductId::from(2)])
            .await
            .expect("resolve");

        assert_eq!(resolved.len(), 1);
        assert_eq!(catalog.list_product_ids().await.expect("list"), vec![ProductId::from(1)]);
    }
}
