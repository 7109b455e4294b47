//! Redis cache backend.
//!
//! Every key that belongs to an owner is also a member of that owner's
//! tracking set (`{owner_type}:{owner_id}:_keys`). A key and its tracking
//! membership are always written and removed in one `MULTI` block, so
//! owner-scoped pattern deletes read the set instead of scanning. Patterns
//! without an owner, such as `leaderboard:*`, are resolved with `KEYS`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};

use coachbase_core::cache::{
    extract_scope, pattern_matches, scope_tracking_key, Cache, Result,
};

use super::error::map_redis_error;

/// Redis-backed [`Cache`]. Clones of the connection manager share one
/// multiplexed connection.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connects to Redis at `url`, e.g. `redis://localhost:6379`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the server cannot be reached.
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }

    async fn run(&self, pipe: &Pipeline) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(map_redis_error)?;
        Ok(())
    }

    /// Deletes `keys` and drops them from `tracking_key` in one transaction.
    async fn remove_tracked(&self, tracking_key: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(keys)
            .ignore()
            .srem(tracking_key, keys)
            .ignore();
        self.run(&pipe).await
    }
}

fn owner_set(key: &str) -> Option<String> {
    let (owner_type, owner_id) = extract_scope(key)?;
    Some(scope_tracking_key(owner_type, owner_id))
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        // Redis expiries are whole seconds; sub-second TTLs round up to one.
        match ttl {
            Some(ttl) => pipe.set_ex(key, value, ttl.as_secs().max(1)).ignore(),
            None => pipe.set(key, value).ignore(),
        };
        if let Some(tracking_key) = owner_set(key) {
            pipe.sadd(tracking_key, key).ignore();
        }

        self.run(&pipe).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match owner_set(key) {
            Some(tracking_key) => self.remove_tracked(&tracking_key, &[key.to_string()]).await,
            None => {
                let mut conn = self.conn.clone();
                let _: () = conn.del(key).await.map_err(map_redis_error)?;
                Ok(())
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut conn = self.conn.clone();

        match owner_set(pattern) {
            Some(tracking_key) => {
                let members: Vec<String> = conn
                    .smembers(&tracking_key)
                    .await
                    .map_err(map_redis_error)?;
                let doomed: Vec<String> = members
                    .into_iter()
                    .filter(|key| pattern_matches(pattern, key))
                    .collect();
                tracing::trace!(pattern, keys = doomed.len(), "Deleting tracked keys");
                self.remove_tracked(&tracking_key, &doomed).await
            }
            None => {
                let keys: Vec<String> = conn.keys(pattern).await.map_err(map_redis_error)?;
                if !keys.is_empty() {
                    let _: () = conn.del(&keys).await.map_err(map_redis_error)?;
                }
                Ok(())
            }
        }
    }
}
