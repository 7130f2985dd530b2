//! Keyed persistence: a thin TTL-aware string store plus the quota engine
//! and typed job records layered on top of it.
//!
//! The store contract is deliberately narrow. Everything that must be
//! atomic against concurrent writers (quota reserve/refund) is a single
//! store primitive, implemented with a server-side script on Redis and a
//! mutex-guarded map in memory.

mod jobs;
mod kv;
mod memory;
mod quota;
mod redis_store;

pub use jobs::{Advance, JobStore, StatusUpdate};
pub use kv::{KeyedStore, StoreError};
pub use memory::MemoryStore;
pub use quota::{hash_ip, Quota, QuotaError};
pub use redis_store::RedisStore;

/// Default record lifetime: uploads, translate jobs, and batches all share
/// one two-hour bucket.
pub const DATA_TTL_SECS: u64 = 60 * 60 * 2;
