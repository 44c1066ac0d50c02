//! Purchase-based product recommendations.
//!
//! Every pair of products bought together bumps a symmetric co-purchase count kept
//! in one ordered multiset per product (its affinity key). Suggestions for a single
//! product read that product's multiset; suggestions for several products sum their
//! multisets into a temporary merge key first, so candidates bought with more of the
//! query products rank higher.
//!
//! A temporary merge key moves through created → merged into → trimmed → deleted
//! within one suggestion call.

mod catalog;
mod engine;
mod keys;
pub mod memory;
mod ranking;
mod store;
mod temp_key;

pub use catalog::{CatalogError, CatalogLookup};
pub use engine::Recommender;
pub use keys::KeySpace;
pub use memory::{InMemoryAffinityStore, InMemoryCatalog};
pub use ranking::{compare_product_ids, RankedProduct};
pub use store::{AffinityStore, ScoredMember, StoreError};

use crate::errors::RecommendationError;

/// Result type for recommendation operations
pub type RecommendationResult<T> = Result<T, RecommendationError>;
