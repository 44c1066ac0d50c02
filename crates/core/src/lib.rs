pub mod config;
pub mod domain;
pub mod errors;
pub mod recommender;

pub use domain::order::CompletedOrder;
pub use domain::product::{Product, ProductId};
pub use errors::{InterfaceError, RecommendationError};
pub use recommender::{
    AffinityStore, CatalogError, CatalogLookup, InMemoryAffinityStore, InMemoryCatalog, KeySpace,
    RankedProduct, Recommender, RecommendationResult, ScoredMember, StoreError,
};
