//! In-memory cache implementation with LRU eviction.
//!
//! Scoped keys (`{owner_type}:{owner_id}:...`) are tracked per owner so that
//! pattern deletes for an owner only look at that owner's keys, mirroring
//! the tracking sets of the Redis backend.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use coachbase_core::cache::{extract_scope, pattern_matches, Cache, Result};

type Scope = (String, Uuid);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

fn scope_of(key: &str) -> Option<Scope> {
    extract_scope(key).map(|(owner_type, owner_id)| (owner_type.to_string(), owner_id))
}

/// In-memory cache with LRU eviction and lazy TTL expiration.
///
/// Clones share the same store.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<LruCache<String, CacheEntry>>>,
    /// Maps (owner_type, owner_id) to the scoped keys stored for that owner.
    tracking: Arc<RwLock<HashMap<Scope, HashSet<String>>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` entries.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(LruCache::new(capacity))),
            tracking: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    async fn untrack(&self, scope: &Scope, keys: &[String]) {
        let mut tracking = self.tracking.write().await;
        if let Some(tracked) = tracking.get_mut(scope) {
            for key in keys {
                tracked.remove(key);
            }
            if tracked.is_empty() {
                tracking.remove(scope);
            }
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired = {
            let mut store = self.store.write().await;
            match store.get(key) {
                Some(entry) if entry.is_expired() => {
                    store.pop(key);
                    true
                }
                Some(entry) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
            }
        };

        if expired {
            if let Some(scope) = scope_of(key) {
                self.untrack(&scope, &[key.to_string()]).await;
            }
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let evicted = {
            let mut store = self.store.write().await;
            store
                .push(key.to_string(), CacheEntry::new(value.to_vec(), ttl))
                .map(|(old_key, _)| old_key)
                .filter(|old_key| old_key != key)
        };

        if let Some(old_key) = evicted {
            if let Some(scope) = scope_of(&old_key) {
                self.untrack(&scope, &[old_key]).await;
            }
        }

        if let Some(scope) = scope_of(key) {
            let mut tracking = self.tracking.write().await;
            tracking.entry(scope).or_default().insert(key.to_string());
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if let Some(scope) = scope_of(key) {
            self.untrack(&scope, &[key.to_string()]).await;
        }

        let mut store = self.store.write().await;
        store.pop(key);

        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let Some(scope) = scope_of(pattern) else {
            // Unscoped pattern: full scan.
            let keys_to_delete: Vec<String> = {
                let mut store = self.store.write().await;
                let keys: Vec<String> = store
                    .iter()
                    .filter(|(key, _)| pattern_matches(pattern, key))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &keys {
                    store.pop(key);
                }
                keys
            };
            for key in keys_to_delete {
                if let Some(scope) = scope_of(&key) {
                    self.untrack(&scope, &[key]).await;
                }
            }
            return Ok(());
        };

        let keys_to_delete: Vec<String> = {
            let tracking = self.tracking.read().await;
            tracking
                .get(&scope)
                .map(|keys| {
                    keys.iter()
                        .filter(|key| pattern_matches(pattern, key))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if keys_to_delete.is_empty() {
            return Ok(());
        }

        {
            let mut store = self.store.write().await;
            for key in &keys_to_delete {
                store.pop(key);
            }
        }
        self.untrack(&scope, &keys_to_delete).await;

        Ok(())
    }
}
