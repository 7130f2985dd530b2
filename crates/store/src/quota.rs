use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use sha2::{Digest, Sha256};

use crate::{KeyedStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("weekly image quota exceeded")]
    Exceeded,
    #[error("count must be positive, got {0}")]
    InvalidCount(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keyed-hash of a client IP. Only the first 16 hex characters are kept;
/// the secret prevents offline reversal of the (tiny) IPv4 space.
pub fn hash_ip(secret: &str, ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Weekly image quota, shared by single and batch translation. Counters
/// rotate per ISO week and expire at the following Monday 00:00 UTC.
#[derive(Clone)]
pub struct Quota {
    kv: Arc<dyn KeyedStore>,
    weekly_limit: i64,
}

impl Quota {
    pub fn new(kv: Arc<dyn KeyedStore>, weekly_limit: i64) -> Self {
        Self { kv, weekly_limit }
    }

    pub fn weekly_limit(&self) -> i64 {
        self.weekly_limit
    }

    pub fn key_for(hashed_ip: &str) -> String {
        Self::key_at(hashed_ip, Utc::now())
    }

    fn key_at(hashed_ip: &str, now: DateTime<Utc>) -> String {
        let week = now.iso_week();
        format!(
            "usage:images:{hashed_ip}:{}-W{:02}",
            week.year(),
            week.week()
        )
    }

    fn seconds_until_next_monday(now: DateTime<Utc>) -> u64 {
        let days_ahead = 7 - u64::from(now.weekday().num_days_from_monday());
        let secs_today = u64::from(now.num_seconds_from_midnight());
        (days_ahead * 24 * 60 * 60 - secs_today).max(1)
    }

    /// Atomically reserves `count` images against the weekly limit.
    /// Returns the new counter value, or [`QuotaError::Exceeded`] with the
    /// counter untouched.
    pub async fn check_and_consume(&self, hashed_ip: &str, count: i64) -> Result<i64, QuotaError> {
        if count <= 0 {
            return Err(QuotaError::InvalidCount(count));
        }
        let now = Utc::now();
        let key = Self::key_at(hashed_ip, now);
        let ttl = Duration::from_secs(Self::seconds_until_next_monday(now));

        let value = self
            .kv
            .bounded_incr(&key, count, self.weekly_limit, ttl)
            .await?;
        if value == -1 {
            return Err(QuotaError::Exceeded);
        }
        Ok(value)
    }

    /// Returns `count` images to the counter, flooring at zero and leaving
    /// the expiry in place. Used to compensate failures between a reserve
    /// and a successful enqueue.
    pub async fn refund(&self, hashed_ip: &str, count: i64) -> Result<i64, QuotaError> {
        if count <= 0 {
            return Err(QuotaError::InvalidCount(count));
        }
        let key = Self::key_for(hashed_ip);
        Ok(self.kv.saturating_decr(&key, count).await?)
    }
}
