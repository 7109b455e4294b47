//! Cache invalidation driven by committed writes.
//!
//! Every changed entity clears its by-id key, the list caches of each owner
//! it is scoped to, and the unscoped list caches of its type. Registered
//! [`CacheInvalidationRule`]s add type-specific patterns on top.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use coachbase_core::cache::{
    entity_key, entity_list_pattern, is_glob, leaderboard_pattern, owner_pattern,
    scoped_list_pattern, Cache, CacheInvalidationRule, CacheInvalidator, CacheScope,
    ChangedEntity, Result,
};
use coachbase_core::coaching::{Challenge, FocusArea};
use coachbase_core::entity::Entity;

#[derive(Debug, Default)]
struct Counters {
    keys_deleted: AtomicU64,
    patterns_deleted: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of the manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationStats {
    pub keys_deleted: u64,
    pub patterns_deleted: u64,
    pub failures: u64,
}

/// Deletes stale cache entries after writes.
///
/// Individual delete failures are logged and counted. The trait methods
/// still report them so the caller can record the failed hook, but the
/// domain helpers (`invalidate_user_caches` and friends) never fail.
pub struct CacheInvalidationManager {
    cache: Arc<dyn Cache>,
    rules: Vec<CacheInvalidationRule>,
    counters: Counters,
}

impl CacheInvalidationManager {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            rules: Vec::new(),
            counters: Counters::default(),
        }
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = CacheInvalidationRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn add_rule(&mut self, rule: CacheInvalidationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[CacheInvalidationRule] {
        &self.rules
    }

    pub fn stats(&self) -> InvalidationStats {
        InvalidationStats {
            keys_deleted: self.counters.keys_deleted.load(Ordering::Relaxed),
            patterns_deleted: self.counters.patterns_deleted.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        match self.cache.delete(key).await {
            Ok(()) => {
                self.counters.keys_deleted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "Invalidated cache key");
                Ok(())
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    key,
                    error = %err,
                    connection = err.is_connection(),
                    "Failed to invalidate cache key"
                );
                Err(err)
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self.cache.delete_pattern(pattern).await {
            Ok(()) => {
                self.counters.patterns_deleted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(pattern, "Invalidated cache pattern");
                Ok(())
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    pattern,
                    error = %err,
                    connection = err.is_connection(),
                    "Failed to invalidate cache pattern"
                );
                Err(err)
            }
        }
    }

    /// Clears every cache scoped to a user.
    pub async fn invalidate_user_caches(&self, user_id: Uuid) {
        let _ = self.delete_pattern(&owner_pattern("user", user_id)).await;
    }

    /// Clears the caches affected by a change to one focus area, including
    /// the caches the focus area itself owns.
    pub async fn invalidate_focus_area(&self, focus_area_id: Uuid, user_id: Uuid) {
        let changed = ChangedEntity::new(FocusArea::ENTITY_TYPE, Some(focus_area_id))
            .with_scope(CacheScope::user(user_id));
        let _ = self.invalidate_changed(&changed).await;
        let _ = self
            .delete_pattern(&owner_pattern(FocusArea::ENTITY_TYPE, focus_area_id))
            .await;
    }

    /// Clears the caches affected by a change to one challenge.
    pub async fn invalidate_challenge(&self, challenge_id: Uuid, focus_area_id: Uuid, user_id: Uuid) {
        let changed = ChangedEntity::new(Challenge::ENTITY_TYPE, Some(challenge_id))
            .with_scope(CacheScope::user(user_id))
            .with_scope(CacheScope::new(
                FocusArea::ENTITY_TYPE,
                "focus_area_id",
                focus_area_id,
            ));
        let _ = self.invalidate_changed(&changed).await;
    }

    pub async fn invalidate_leaderboards(&self) {
        let _ = self.delete_pattern(&leaderboard_pattern()).await;
    }
}

#[async_trait]
impl CacheInvalidator for CacheInvalidationManager {
    async fn invalidate_entity(&self, entity_type: &str, id: Uuid) -> Result<()> {
        self.delete_key(&entity_key(entity_type, id)).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
        if is_glob(pattern) {
            self.delete_pattern(pattern).await
        } else {
            self.delete_key(pattern).await
        }
    }

    async fn invalidate_list_caches(&self, entity_type: &str) -> Result<()> {
        self.delete_pattern(&entity_list_pattern(entity_type)).await
    }

    async fn invalidate_changed(&self, changed: &ChangedEntity) -> Result<()> {
        let Some(id) = changed.id else {
            tracing::debug!(
                entity_type = changed.entity_type,
                "Skipping invalidation for entity without id"
            );
            return Ok(());
        };

        let mut first_error = self.invalidate_entity(changed.entity_type, id).await.err();

        let mut patterns: Vec<String> = changed
            .scopes
            .iter()
            .map(|scope| scoped_list_pattern(scope.owner_type, scope.owner_id, changed.entity_type))
            .collect();
        patterns.push(entity_list_pattern(changed.entity_type));
        let previous = changed.previous();
        for view in std::iter::once(changed).chain(previous.as_ref()) {
            for rule in self.rules.iter().filter(|rule| rule.applies_to(view)) {
                patterns.extend(rule.render(view));
            }
        }

        let mut seen = std::collections::HashSet::new();
        patterns.retain(|pattern| seen.insert(pattern.clone()));

        for pattern in &patterns {
            if let Err(err) = self.invalidate_pattern(pattern).await {
                first_error.get_or_insert(err);
            }
        }

        tracing::debug!(
            entity_type = changed.entity_type,
            id = %id,
            patterns = patterns.len(),
            "Invalidated caches for changed entity"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use coachbase_core::cache::{scoped_list_key, CacheError};
    use coachbase_core::coaching::invalidation_rules;
    use std::time::Duration;

    fn manager() -> (Arc<MemoryCache>, CacheInvalidationManager) {
        let cache = Arc::new(MemoryCache::new(100));
        let manager = CacheInvalidationManager::new(cache.clone()).with_rules(invalidation_rules());
        (cache, manager)
    }

    async fn seed(cache: &MemoryCache, keys: &[&str]) {
        for key in keys {
            cache.set(key, b"cached", None).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_invalidate_changed_clears_entity_owner_lists_and_rules() {
        let (cache, manager) = manager();
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();
        let id = Uuid::new_v4();

        let by_id = entity_key("focus_area", id);
        let owner_list = scoped_list_key("user", user, "focus_area", "active");
        let other_list = scoped_list_key("user", other_user, "focus_area", "active");
        let type_list = "focus_area:list:all".to_string();
        let dashboard = format!("user:{}:dashboard:summary", user);
        let unrelated = scoped_list_key("user", user, "challenge", "active");
        seed(
            &cache,
            &[&by_id, &owner_list, &other_list, &type_list, &dashboard, &unrelated],
        )
        .await;

        let changed = ChangedEntity::new("focus_area", Some(id)).with_scope(CacheScope::user(user));
        manager.invalidate_changed(&changed).await.unwrap();

        assert!(cache.get(&by_id).await.unwrap().is_none());
        assert!(cache.get(&owner_list).await.unwrap().is_none());
        assert!(cache.get(&type_list).await.unwrap().is_none());
        assert!(cache.get(&dashboard).await.unwrap().is_none());
        assert!(cache.get(&other_list).await.unwrap().is_some());
        assert!(cache.get(&unrelated).await.unwrap().is_some());
        assert_eq!(manager.stats().failures, 0);
    }

    #[tokio::test]
    async fn test_owner_change_clears_previous_owner_caches() {
        let (cache, manager) = manager();
        let old_owner = Uuid::new_v4();
        let new_owner = Uuid::new_v4();
        let id = Uuid::new_v4();

        let old_list = scoped_list_key("user", old_owner, "focus_area", "all");
        let new_list = scoped_list_key("user", new_owner, "focus_area", "all");
        let old_dashboard = format!("user:{}:dashboard:summary", old_owner);
        let new_dashboard = format!("user:{}:dashboard:summary", new_owner);
        seed(&cache, &[&old_list, &new_list, &old_dashboard, &new_dashboard]).await;

        let changed = ChangedEntity::new("focus_area", Some(id))
            .with_scope(CacheScope::user(new_owner))
            .with_previous_scopes([CacheScope::user(old_owner)]);
        manager.invalidate_changed(&changed).await.unwrap();

        for key in [&old_list, &new_list, &old_dashboard, &new_dashboard] {
            assert!(cache.get(key).await.unwrap().is_none(), "{key} survived");
        }
    }

    #[tokio::test]
    async fn test_invalidate_changed_without_id_is_noop() {
        let (cache, manager) = manager();
        cache.set("focus_area:list:all", b"cached", None).await.unwrap();

        manager
            .invalidate_changed(&ChangedEntity::new("focus_area", None))
            .await
            .unwrap();

        assert!(cache.get("focus_area:list:all").await.unwrap().is_some());
        assert_eq!(manager.stats(), InvalidationStats::default());
    }

    #[tokio::test]
    async fn test_invalidate_challenge_clears_progress_and_leaderboards() {
        let (cache, manager) = manager();
        let user = Uuid::new_v4();
        let focus_area = Uuid::new_v4();
        let challenge = Uuid::new_v4();

        let progress = format!("focus_area:{}:progress", focus_area);
        let focus_area_challenges = scoped_list_key("focus_area", focus_area, "challenge", "open");
        seed(
            &cache,
            &[&progress, &focus_area_challenges, "leaderboard:weekly"],
        )
        .await;

        manager
            .invalidate_challenge(challenge, focus_area, user)
            .await;

        assert!(cache.get(&progress).await.unwrap().is_none());
        assert!(cache.get(&focus_area_challenges).await.unwrap().is_none());
        assert!(cache.get("leaderboard:weekly").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_focus_area_clears_owned_caches() {
        let (cache, manager) = manager();
        let user = Uuid::new_v4();
        let focus_area = Uuid::new_v4();
        let owned = scoped_list_key("focus_area", focus_area, "challenge", "open");
        seed(&cache, &[&owned]).await;

        manager.invalidate_focus_area(focus_area, user).await;

        assert!(cache.get(&owned).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_user_caches_leaves_other_users() {
        let (cache, manager) = manager();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = scoped_list_key("user", user, "challenge", "open");
        let theirs = scoped_list_key("user", other, "challenge", "open");
        seed(&cache, &[&mine, &theirs]).await;

        manager.invalidate_user_caches(user).await;

        assert!(cache.get(&mine).await.unwrap().is_none());
        assert!(cache.get(&theirs).await.unwrap().is_some());
    }

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_remaining_patterns_still_run() {
        let manager = CacheInvalidationManager::new(Arc::new(BrokenCache));
        let changed = ChangedEntity::new("focus_area", Some(Uuid::new_v4()))
            .with_scope(CacheScope::user(Uuid::new_v4()));

        let result = manager.invalidate_changed(&changed).await;

        assert_eq!(
            result,
            Err(CacheError::ConnectionFailed("refused".to_string()))
        );
        let stats = manager.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.patterns_deleted, 2);
    }

    #[tokio::test]
    async fn test_helpers_swallow_failures() {
        let manager = CacheInvalidationManager::new(Arc::new(BrokenCache));

        manager
            .invalidate_focus_area(Uuid::new_v4(), Uuid::new_v4())
            .await;

        assert_eq!(manager.stats().failures, 1);
    }
}
