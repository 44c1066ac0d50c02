use uuid::Uuid;

use super::ranking::{compare_product_ids, distinct_ids};
use crate::config::{RecommenderConfig, TempKeyNaming};
use crate::domain::product::ProductId;

const AFFINITY_SUFFIX: &str = ":purchased_with";

/// Naming scheme for affinity and temporary merge keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpace {
    key_prefix: String,
    temp_key_prefix: String,
    naming: TempKeyNaming,
}

impl KeySpace {
    pub fn new(
        key_prefix: impl Into<String>,
        temp_key_prefix: impl Into<String>,
        naming: TempKeyNaming,
    ) -> Self {
        Self { key_prefix: key_prefix.into(), temp_key_prefix: temp_key_prefix.into(), naming }
    }

    pub fn from_config(config: &RecommenderConfig) -> Self {
        Self::new(&config.key_prefix, &config.temp_key_prefix, config.temp_key_naming)
    }

    /// `product:42:purchased_with` with the default prefix.
    pub fn affinity_key(&self, product_id: &ProductId) -> String {
        format!("{}:{}{AFFINITY_SUFFIX}", self.key_prefix, product_id)
    }

    /// Prefix and suffix shared by every affinity key, for store scans.
    pub fn affinity_key_affixes(&self) -> (String, &'static str) {
        (format!("{}:", self.key_prefix), AFFINITY_SUFFIX)
    }

    pub fn affinity_keys(&self, product_ids: &[ProductId]) -> Vec<String> {
        product_ids.iter().map(|id| self.affinity_key(id)).collect()
    }

    /// Key for merging the affinities of `product_ids`. The derivation ignores input
    /// order and repeats; under [`TempKeyNaming::Unique`] each call gets a fresh key.
    pub fn temp_merge_key(&self, product_ids: &[ProductId]) -> String {
        let derivation = query_digest(product_ids);
        match self.naming {
            TempKeyNaming::Deterministic => format!("{}:{derivation}", self.temp_key_prefix),
            TempKeyNaming::Unique => {
                format!("{}:{derivation}:{}", self.temp_key_prefix, Uuid::new_v4().simple())
            }
        }
    }

    pub fn is_temp_key(&self, key: &str) -> bool {
        key.strip_prefix(&self.temp_key_prefix).is_some_and(|rest| rest.starts_with(':'))
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::from_config(&RecommenderConfig::default())
    }
}

fn query_digest(product_ids: &[ProductId]) -> String {
    let mut ids = distinct_ids(product_ids);
    ids.sort_by(|a, b| compare_product_ids(a.as_str(), b.as_str()));

    let joined = ids.iter().map(ProductId::as_str).collect::<Vec<_>>().join(",");
    blake3::hash(joined.as_bytes()).to_hex().to_string()
}
