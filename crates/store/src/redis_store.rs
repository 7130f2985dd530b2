use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::{KeyedStore, StoreError};

const CONSUME_SCRIPT: &str = r#"
local current = tonumber(redis.call("GET", KEYS[1]) or "0")
local requested = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
if current + requested > limit then
    return -1
end
redis.call("INCRBY", KEYS[1], requested)
redis.call("EXPIRE", KEYS[1], ARGV[3])
return current + requested
"#;

const REFUND_SCRIPT: &str = r#"
local current = tonumber(redis.call("GET", KEYS[1]) or "0")
local refund = tonumber(ARGV[1])
local new_val = current - refund
if new_val < 0 then
    new_val = 0
end
redis.call("SET", KEYS[1], new_val, "KEEPTTL")
return new_val
"#;

/// Redis-backed [`KeyedStore`]. A [`ConnectionManager`] multiplexes and
/// transparently reconnects; the counter primitives run as Lua scripts so
/// the read-check-write-expire sequence is atomic on the server.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    consume: redis::Script,
    refund: redis::Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            consume: redis::Script::new(CONSUME_SCRIPT),
            refund: redis::Script::new(REFUND_SCRIPT),
        })
    }
}

#[async_trait::async_trait]
impl KeyedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_keep_ttl(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        // XX: only overwrite an existing key, KEEPTTL: do not disturb its
        // expiry. A missing (expired) key yields nil.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn ttl_of(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.manager.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        if millis < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(millis as u64)))
    }

    async fn bounded_incr(
        &self,
        key: &str,
        by: i64,
        ceiling: i64,
        ttl: Duration,
    ) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        let value: i64 = self
            .consume
            .key(key)
            .arg(by)
            .arg(ceiling)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn saturating_decr(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        let value: i64 = self
            .refund
            .key(key)
            .arg(by)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }
}
