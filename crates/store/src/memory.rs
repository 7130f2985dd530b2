use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{KeyedStore, StoreError};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

/// Process-local [`KeyedStore`] with real TTL semantics, used by tests and
/// single-process deployments. A single mutex stands in for Redis's
/// single-threaded command loop, which is what makes the counter
/// primitives atomic here.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(key) {
            Some(entry) if entry.live() => {
                entry.value = value.to_string();
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(key) {
            Some(entry) => Ok(entry.live()),
            None => Ok(false),
        }
    }

    async fn ttl_of(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.live() => Ok(entry
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()))),
            _ => Ok(None),
        }
    }

    async fn bounded_incr(
        &self,
        key: &str,
        by: i64,
        ceiling: i64,
        ttl: Duration,
    ) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let current = match entries.get(key) {
            Some(entry) if entry.live() => entry.value.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        if current + by > ceiling {
            return Ok(-1);
        }
        let next = current + by;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(next)
    }

    async fn saturating_decr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let (current, expires_at) = match entries.get(key) {
            Some(entry) if entry.live() => {
                (entry.value.parse::<i64>().unwrap_or(0), entry.expires_at)
            }
            _ => (0, None),
        };
        let next = (current - by).max(0);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }
}
