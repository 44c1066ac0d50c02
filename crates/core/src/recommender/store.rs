//! Contract for the sorted-set service that holds learned affinities.

use async_trait::async_trait;
use thiserror::Error;

/// A `(member, score)` pair as enumerated from an ordered multiset.
pub type ScoredMember = (String, f64);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("affinity store unreachable: {0}")]
    Unavailable(String),
    #[error("affinity store timed out after {timeout_ms}ms during {operation}")]
    Timeout { operation: &'static str, timeout_ms: u64 },
    #[error("unexpected affinity store reply: {0}")]
    Protocol(String),
}

/// Named ordered multisets of `(member, score)`.
///
/// Every operation is expected to be atomic as observed by other clients of the
/// same store; the engine adds no locking of its own.
#[async_trait]
pub trait AffinityStore: Send + Sync {
    /// Adds `delta` to `member`'s score in `key`, creating both if absent.
    /// Returns the new score.
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError>;

    /// Replaces `destination` with the union of `sources`, summing shared members.
    async fn merge_sum(&self, destination: &str, sources: &[String]) -> Result<(), StoreError>;

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    /// Members of `key` by descending score, skipping `offset` and returning at most
    /// `count` entries (`None` for all). A missing key is an empty range.
    async fn range_descending(
        &self,
        key: &str,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    async fn delete_key(&self, key: &str) -> Result<(), StoreError>;

    /// Every existing key that starts with `prefix` and ends with `suffix`, in no
    /// particular order.
    async fn scan_keys(&self, prefix: &str, suffix: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
