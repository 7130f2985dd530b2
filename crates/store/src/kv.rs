use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error")]
    Backend(#[from] redis::RedisError),
    #[error("undecodable record at {key:?}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal keyed string store with TTLs and two atomic counter primitives.
///
/// `bounded_incr` and `saturating_decr` must be linearizable with respect
/// to all other operations on the same key; they carry the whole
/// read-check-write-expire sequence of the quota engine.
#[async_trait::async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` and (re)sets the key's TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Overwrites an existing key's value while preserving its TTL.
    /// Returns `false` without writing when the key does not exist, so an
    /// update can never resurrect an expired record as an unbounded key.
    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining lifetime, `None` for a missing key or one without expiry.
    async fn ttl_of(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Atomically adds `by` unless the result would exceed `ceiling`, also
    /// resetting the TTL. Returns the new value, or `-1` when the ceiling
    /// blocked the increment (nothing is written in that case).
    async fn bounded_incr(
        &self,
        key: &str,
        by: i64,
        ceiling: i64,
        ttl: Duration,
    ) -> Result<i64, StoreError>;

    /// Atomically subtracts `by`, flooring at zero and preserving the TTL.
    /// Returns the new value.
    async fn saturating_decr(&self, key: &str, by: i64) -> Result<i64, StoreError>;
}
