use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{keys, ChangedEntity, Result};

/// Trait for basic cache operations.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Deletes all values matching a glob pattern (e.g. `user:*:focus_area:*`).
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Sink for cache invalidation requests raised by committed writes.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Clears the by-id entry of one entity.
    async fn invalidate_entity(&self, entity_type: &str, id: Uuid) -> Result<()>;

    /// Clears every key matching a glob pattern.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<()>;

    /// Clears the unscoped list and aggregate caches of an entity type.
    async fn invalidate_list_caches(&self, entity_type: &str) -> Result<()>;

    /// Clears everything a change to `changed` can make stale: the by-id
    /// entry, the lists of each owner scope, then the type's list caches.
    ///
    /// Entities without an id are skipped. Every step runs even if an
    /// earlier one fails; the first failure is returned.
    async fn invalidate_changed(&self, changed: &ChangedEntity) -> Result<()> {
        let Some(id) = changed.id else {
            return Ok(());
        };

        let mut first_error = self.invalidate_entity(changed.entity_type, id).await.err();

        for scope in &changed.scopes {
            let pattern =
                keys::scoped_list_pattern(scope.owner_type, scope.owner_id, changed.entity_type);
            if let Err(err) = self.invalidate_pattern(&pattern).await {
                first_error.get_or_insert(err);
            }
        }

        if let Err(err) = self.invalidate_list_caches(changed.entity_type).await {
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheScope};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingInvalidator {
        calls: Mutex<Vec<String>>,
        fail_entity: bool,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingInvalidator {
        async fn invalidate_entity(&self, entity_type: &str, id: Uuid) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("entity {}:{}", entity_type, id));
            if self.fail_entity {
                return Err(CacheError::OperationFailed("boom".to_string()));
            }
            Ok(())
        }

        async fn invalidate_pattern(&self, pattern: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("pattern {}", pattern));
            Ok(())
        }

        async fn invalidate_list_caches(&self, entity_type: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("lists {}", entity_type));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_invalidate_changed_order() {
        let invalidator = RecordingInvalidator::default();
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let changed = ChangedEntity::new("focus_area", Some(id)).with_scope(CacheScope::user(owner));

        invalidator.invalidate_changed(&changed).await.unwrap();

        assert_eq!(
            *invalidator.calls.lock().unwrap(),
            vec![
                format!("entity focus_area:{}", id),
                format!("pattern user:{}:focus_area:*", owner),
                "lists focus_area".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalidate_changed_skips_missing_id() {
        let invalidator = RecordingInvalidator::default();

        invalidator
            .invalidate_changed(&ChangedEntity::new("focus_area", None))
            .await
            .unwrap();

        assert!(invalidator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_changed_continues_after_failure() {
        let invalidator = RecordingInvalidator {
            fail_entity: true,
            ..Default::default()
        };
        let changed = ChangedEntity::new("challenge", Some(Uuid::new_v4()));

        let result = invalidator.invalidate_changed(&changed).await;

        assert!(result.is_err());
        assert_eq!(invalidator.calls.lock().unwrap().len(), 2);
    }
}
