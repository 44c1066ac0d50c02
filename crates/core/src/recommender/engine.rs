//! Co-purchase recording and suggestion queries over an [`AffinityStore`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::catalog::CatalogLookup;
use super::keys::KeySpace;
use super::ranking::{distinct_ids, order_by_rank, rank_entries, RankedProduct};
use super::store::{AffinityStore, ScoredMember};
use super::temp_key::TempMergeKey;
use super::RecommendationResult;
use crate::config::RecommenderConfig;
use crate::domain::order::CompletedOrder;
use crate::domain::product::{Product, ProductId};

/// Stateless recommender; all learned state lives in the injected store.
pub struct Recommender {
    store: Arc<dyn AffinityStore>,
    catalog: Arc<dyn CatalogLookup>,
    keys: KeySpace,
    config: RecommenderConfig,
}

impl Recommender {
    pub fn new(
        store: Arc<dyn AffinityStore>,
        catalog: Arc<dyn CatalogLookup>,
        config: RecommenderConfig,
    ) -> Self {
        Self { store, catalog, keys: KeySpace::from_config(&config), config }
    }

    pub fn with_defaults(store: Arc<dyn AffinityStore>, catalog: Arc<dyn CatalogLookup>) -> Self {
        Self::new(store, catalog, RecommenderConfig::default())
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Increments the affinity of every ordered pair of distinct products bought
    /// together. Not idempotent: replaying a batch doubles its contribution.
    ///
    /// A product listed twice is never paired with itself, but each occurrence still
    /// pairs with the other products.
    pub async fn record_co_purchase(&self, product_ids: &[ProductId]) -> RecommendationResult<()> {
        if product_ids.len() < 2 {
            debug!(
                event_name = "recommender.co_purchase.skipped",
                products = product_ids.len(),
                "fewer than two products, nothing to record"
            );
            return Ok(());
        }

        let mut increments = 0usize;
        for product_id in product_ids {
            let key = self.keys.affinity_key(product_id);
            for with_id in product_ids {
                if product_id == with_id {
                    continue;
                }
                self.store.increment(&key, with_id.as_str(), 1.0).await.map_err(|error| {
                    warn!(
                        event_name = "recommender.co_purchase.failed",
                        products = product_ids.len(),
                        increments_applied = increments,
                        error = %error,
                        "co-purchase recording aborted"
                    );
                    error
                })?;
                increments += 1;
            }
        }

        info!(
            event_name = "recommender.co_purchase.recorded",
            products = product_ids.len(),
            increments,
            "co-purchase recorded"
        );
        Ok(())
    }

    /// Post-payment hook: records the products of a paid order.
    pub async fn record_order(&self, order: &CompletedOrder) -> RecommendationResult<()> {
        let result = self.record_co_purchase(&order.product_ids).await;
        match &result {
            Ok(()) => debug!(
                event_name = "recommender.order.recorded",
                order_id = %order.order_id,
                lines = order.product_ids.len(),
                "order purchases recorded"
            ),
            Err(error) => warn!(
                event_name = "recommender.order.failed",
                order_id = %order.order_id,
                error = %error,
                "order purchases not recorded; caller may redeliver"
            ),
        }
        result
    }

    /// Ranked ids most often bought with `product_ids`, best first, at most `limit`.
    ///
    /// An empty query or a zero limit returns an empty list without touching the
    /// store. Equal scores are ordered by ascending product id.
    pub async fn suggest_ids(
        &self,
        product_ids: &[ProductId],
        limit: usize,
    ) -> RecommendationResult<Vec<RankedProduct>> {
        let query = distinct_ids(product_ids);
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let entries = match query.as_slice() {
            [single] => self.single_entries(single, limit).await?,
            _ => self.merged_entries(&query).await?,
        };

        let ranked = rank_entries(entries, &query, limit);
        debug!(
            event_name = "recommender.suggest.ranked",
            query_products = query.len(),
            limit,
            returned = ranked.len(),
            "suggestions ranked"
        );
        Ok(ranked)
    }

    /// Suggested products in rank order. Ids the catalog no longer knows are
    /// dropped.
    pub async fn suggest(
        &self,
        product_ids: &[ProductId],
        limit: usize,
    ) -> RecommendationResult<Vec<Product>> {
        let ranked = self.suggest_ids(product_ids, limit).await?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = ranked.iter().map(|entry| entry.product_id.clone()).collect();
        let resolved = self.catalog.resolve_products(&ids).await?;
        let products = order_by_rank(&ranked, resolved);

        if products.len() < ranked.len() {
            debug!(
                event_name = "recommender.suggest.catalog_mismatch",
                dropped = ranked.len() - products.len(),
                "suggested ids missing from catalog were dropped"
            );
        }
        info!(
            event_name = "recommender.suggest.completed",
            query_products = product_ids.len(),
            returned = products.len(),
            "suggestions resolved"
        );
        Ok(products)
    }

    /// Like [`Recommender::suggest`] but degrades to an empty list on any failure.
    pub async fn suggest_or_empty(&self, product_ids: &[ProductId], limit: usize) -> Vec<Product> {
        match self.suggest(product_ids, limit).await {
            Ok(products) => products,
            Err(error) => {
                warn!(
                    event_name = "recommender.suggest.degraded",
                    store_unavailable = error.is_store_unavailable(),
                    error = %error,
                    "suggestions unavailable, returning none"
                );
                Vec::new()
            }
        }
    }

    /// Suggestions for a product detail page.
    pub async fn suggest_for_product(&self, product_id: &ProductId) -> Vec<Product> {
        self.suggest_or_empty(std::slice::from_ref(product_id), self.config.detail_limit).await
    }

    /// Suggestions for the current cart contents.
    pub async fn suggest_for_cart(&self, cart_product_ids: &[ProductId]) -> Vec<Product> {
        if cart_product_ids.is_empty() {
            return Vec::new();
        }
        self.suggest_or_empty(cart_product_ids, self.config.cart_limit).await
    }

    /// Deletes the affinity key of every product in the catalog and every other
    /// affinity key found in the store, including those of products already removed
    /// from the catalog. Returns the number of keys deleted.
    pub async fn purge(&self) -> RecommendationResult<usize> {
        let product_ids = self.catalog.list_product_ids().await?;
        let (prefix, suffix) = self.keys.affinity_key_affixes();

        let mut keys: BTreeSet<String> =
            self.keys.affinity_keys(&product_ids).into_iter().collect();
        let stored = self.store.scan_keys(&prefix, suffix).await?;
        let orphaned = stored.iter().filter(|key| !keys.contains(*key)).count();
        keys.extend(stored);

        if orphaned > 0 {
            debug!(
                event_name = "recommender.purge.orphans",
                orphaned,
                "affinity keys without a catalog product"
            );
        }
        self.delete_keys(keys).await
    }

    /// Deletes the affinity keys of `product_ids`.
    pub async fn purge_products(&self, product_ids: &[ProductId]) -> RecommendationResult<usize> {
        self.delete_keys(self.keys.affinity_keys(product_ids)).await
    }

    async fn delete_keys(
        &self,
        keys: impl IntoIterator<Item = String>,
    ) -> RecommendationResult<usize> {
        let mut deleted = 0usize;
        for key in keys {
            self.store.delete_key(&key).await?;
            deleted += 1;
        }

        info!(event_name = "recommender.purge.completed", keys = deleted, "affinities purged");
        Ok(deleted)
    }

    /// Reads the top of one product's key: the first `limit + 1` entries, then
    /// further pages only while they tie with the last score read. Ties are broken
    /// by id after the read, so every entry sharing the boundary score is needed.
    async fn single_entries(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> RecommendationResult<Vec<ScoredMember>> {
        let key = self.keys.affinity_key(product_id);
        let page_size = limit.saturating_add(1);

        let mut entries = self.store.range_descending(&key, 0, Some(page_size)).await?;
        let mut last_page_full = entries.len() == page_size;

        while last_page_full {
            let Some(&(_, boundary)) = entries.last() else {
                break;
            };
            let page = self.store.range_descending(&key, entries.len(), Some(page_size)).await?;
            last_page_full = page.len() == page_size;

            for entry in page {
                if entry.1.total_cmp(&boundary).is_ne() {
                    return Ok(entries);
                }
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    async fn merged_entries(&self, query: &[ProductId]) -> RecommendationResult<Vec<ScoredMember>> {
        let temp_key = TempMergeKey::new(Arc::clone(&self.store), self.keys.temp_merge_key(query));
        let entries = self.merge_and_read(temp_key.name(), query).await;
        temp_key.release().await;
        entries
    }

    async fn merge_and_read(
        &self,
        temp_key: &str,
        query: &[ProductId],
    ) -> RecommendationResult<Vec<ScoredMember>> {
        self.store.merge_sum(temp_key, &self.keys.affinity_keys(query)).await?;

        let members: Vec<String> = query.iter().map(|id| id.as_str().to_owned()).collect();
        self.store.remove_members(temp_key, &members).await?;

        Ok(self.store.range_descending(temp_key, 0, None).await?)
    }
}
