//! Generic repository shared by every entity store.
//!
//! Reads go through the retry executor, optionally behind a cache-aside
//! read cache. Writes go through the transaction coordinator: validate,
//! write inside a transaction, and only after commit hand the entity's
//! queued events to the event sink and invalidate its caches.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use coachbase_core::cache::{deserialize_value, entity_key, serialize_value, Cache, ChangedEntity};
use coachbase_core::casing::snake_to_camel;
use coachbase_core::entity::{Entity, HasDomainEvents};
use coachbase_core::event::DomainEvent;
use coachbase_core::storage::{
    self, DeleteOutcome, Filter, RepositoryError, Result, Row, StorageClient,
};

use super::codec::{decode_row, encode_entity};
use crate::transaction::{TransactionCoordinator, TransactionOptions, UnitOfWork};

struct ReadCache {
    cache: Arc<dyn Cache>,
    ttl: Option<Duration>,
}

/// Storage access for one entity type in one table.
pub struct Repository<E, S>
where
    E: HasDomainEvents,
    S: StorageClient,
{
    table: &'static str,
    coordinator: Arc<TransactionCoordinator<S>>,
    read_cache: Option<ReadCache>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Repository<E, S>
where
    E: HasDomainEvents,
    S: StorageClient,
{
    pub fn new(table: &'static str, coordinator: Arc<TransactionCoordinator<S>>) -> Self {
        Self {
            table,
            coordinator,
            read_cache: None,
            _entity: PhantomData,
        }
    }

    /// Serves `find_by_id` from `cache` when possible and fills it on a miss.
    ///
    /// The write path only keeps this cache fresh if the coordinator's
    /// invalidator clears the same cache.
    pub fn with_read_cache(mut self, cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        self.read_cache = Some(ReadCache { cache, ttl });
        self
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn coordinator(&self) -> &Arc<TransactionCoordinator<S>> {
        &self.coordinator
    }

    pub fn validate_id(&self, operation: &'static str, raw: &str) -> Result<Uuid> {
        storage::validate_id(E::ENTITY_TYPE, operation, raw)
    }

    pub fn validate_required_params(
        &self,
        operation: &'static str,
        params: &[(&str, Option<&str>)],
    ) -> Result<()> {
        storage::validate_required_params(E::ENTITY_TYPE, operation, params)
    }

    /// Loads one entity.
    ///
    /// Returns `Ok(None)` for a missing entity unless `throw_if_not_found`
    /// is set, in which case the result is [`RepositoryError::NotFound`].
    pub async fn find_by_id(&self, id: &str, throw_if_not_found: bool) -> Result<Option<E>> {
        let id = self.validate_id("find_by_id", id)?;

        if let Some(entity) = self.cached(id).await {
            return Ok(Some(entity));
        }

        let rows = self.select("find_by_id", Filter::by_id(id)).await?;
        let entity = rows.into_iter().next().map(decode_row::<E>).transpose()?;

        match entity {
            Some(entity) => {
                self.populate_cache(id, &entity).await;
                Ok(Some(entity))
            }
            None if throw_if_not_found => Err(RepositoryError::not_found(E::ENTITY_TYPE, id)),
            None => Ok(None),
        }
    }

    /// Loads an entity that must exist.
    pub async fn get(&self, id: &str) -> Result<E> {
        self.find_by_id(id, true)
            .await?
            .ok_or_else(|| RepositoryError::not_found(E::ENTITY_TYPE, id))
    }

    /// Loads several entities in one read. Duplicate ids are read once;
    /// missing ids are skipped and the order is unspecified.
    pub async fn find_by_ids<I>(&self, ids: I) -> Result<Vec<E>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for raw in ids {
            let id = self.validate_id("find_by_ids", raw.as_ref())?;
            if seen.insert(id) {
                unique.push(id.to_string());
            }
        }

        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .select("find_by_ids", Filter::any_of("id", unique))
            .await?;
        rows.into_iter().map(decode_row::<E>).collect()
    }

    /// Loads every entity whose storage column equals `value`.
    pub async fn find_where(&self, column: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        let rows = self
            .select("find_where", Filter::eq(column, value))
            .await?;
        rows.into_iter().map(decode_row::<E>).collect()
    }

    /// Inserts or updates the entity and returns it as stored.
    ///
    /// The entity's queued events are taken up front. They reach the event
    /// sink only if the write commits and are dropped otherwise.
    pub async fn save(&self, mut entity: E) -> Result<E> {
        entity
            .validate()
            .map_err(|message| RepositoryError::validation(E::ENTITY_TYPE, "save", message))?;

        let events = entity.take_domain_events();
        let existing_id = entity.id();
        let row = encode_entity(&entity)?;
        let table = self.table;

        let saved = self
            .coordinator
            .with_transaction(TransactionOptions::new(E::ENTITY_TYPE, "save"), move |tx| {
                let row = row.clone();
                let mut events = events.clone();
                Box::pin(async move {
                    let (stored, previous_scopes) = match existing_id {
                        Some(id) => {
                            let previous = tx
                                .select(table, &Filter::by_id(id))
                                .await?
                                .into_iter()
                                .next()
                                .ok_or_else(|| RepositoryError::not_found(E::ENTITY_TYPE, id))?;
                            let previous: E = decode_row(previous)?;
                            let stored = tx
                                .update(table, id, row)
                                .await?
                                .ok_or_else(|| RepositoryError::not_found(E::ENTITY_TYPE, id))?;
                            (stored, previous.cache_scopes())
                        }
                        None => (tx.insert(table, row).await?, Vec::new()),
                    };

                    let saved: E = decode_row(stored)?;
                    if let Some(id) = saved.id() {
                        for event in &mut events {
                            event.stamp_source_id(id);
                        }
                    }

                    // Lists of an owner the entity moved away from are stale too.
                    let change = ChangedEntity::of(&saved).with_previous_scopes(previous_scopes);
                    Ok(UnitOfWork::new(saved)
                        .with_events(events)
                        .with_change(change))
                })
            })
            .await?;

        tracing::debug!(
            entity_type = E::ENTITY_TYPE,
            id = ?saved.id(),
            created = existing_id.is_none(),
            "Saved entity"
        );
        Ok(saved)
    }

    /// Deletes the entity with the given id.
    ///
    /// The entity is read inside the same transaction so the deletion event
    /// and the invalidated caches describe exactly what was removed.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let id = self.validate_id("delete", id)?;
        let table = self.table;

        let outcome = self
            .coordinator
            .with_transaction(TransactionOptions::new(E::ENTITY_TYPE, "delete"), move |tx| {
                Box::pin(async move {
                    let row = tx
                        .select(table, &Filter::by_id(id))
                        .await?
                        .into_iter()
                        .next()
                        .ok_or_else(|| RepositoryError::not_found(E::ENTITY_TYPE, id))?;
                    let entity: E = decode_row(row)?;

                    let deleted = tx.delete(table, id).await?;
                    let unit = UnitOfWork::new(DeleteOutcome { deleted, id });
                    if !deleted {
                        return Ok(unit);
                    }

                    Ok(unit
                        .with_events([deletion_event(&entity, id)])
                        .with_change(ChangedEntity::of(&entity)))
                })
            })
            .await?;

        tracing::debug!(
            entity_type = E::ENTITY_TYPE,
            id = %id,
            deleted = outcome.deleted,
            "Deleted entity"
        );
        Ok(outcome)
    }

    async fn select(&self, operation: &'static str, filter: Filter) -> Result<Vec<Row>> {
        let storage = self.coordinator.storage();
        let table = self.table;
        let filter = &filter;

        self.coordinator
            .retry()
            .run(operation, move |_| async move {
                storage
                    .select(table, filter)
                    .await
                    .map_err(RepositoryError::from)
            })
            .await
            .map_err(|failure| failure.settle(E::ENTITY_TYPE, operation))
    }

    async fn cached(&self, id: Uuid) -> Option<E> {
        let read_cache = self.read_cache.as_ref()?;
        let key = entity_key(E::ENTITY_TYPE, id);

        match read_cache.cache.get(&key).await {
            Ok(Some(bytes)) => match deserialize_value::<E>(&bytes) {
                Ok(entity) => {
                    tracing::trace!(entity_type = E::ENTITY_TYPE, id = %id, "Cache hit");
                    Some(entity)
                }
                Err(err) => {
                    // Corrupt entries are treated as a miss.
                    tracing::warn!(entity_type = E::ENTITY_TYPE, id = %id, error = %err, "Cache deserialization failed");
                    None
                }
            },
            Ok(None) => {
                tracing::trace!(entity_type = E::ENTITY_TYPE, id = %id, "Cache miss");
                None
            }
            Err(err) => {
                tracing::warn!(entity_type = E::ENTITY_TYPE, id = %id, error = %err, "Cache read failed");
                None
            }
        }
    }

    async fn populate_cache(&self, id: Uuid, entity: &E) {
        let Some(read_cache) = self.read_cache.as_ref() else {
            return;
        };

        let bytes = match serialize_value(entity) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(entity_type = E::ENTITY_TYPE, id = %id, error = %err, "Cache serialization failed");
                return;
            }
        };

        let key = entity_key(E::ENTITY_TYPE, id);
        if let Err(err) = read_cache.cache.set(&key, &bytes, read_cache.ttl).await {
            tracing::warn!(entity_type = E::ENTITY_TYPE, id = %id, error = %err, "Failed to cache entity");
        }
    }
}

/// Builds the `{PREFIX}_DELETED` event. The payload carries the id and
/// every owner reference, camelCased, e.g. `{"id": ..., "userId": ...}`.
fn deletion_event<E: Entity>(entity: &E, id: Uuid) -> DomainEvent {
    let mut payload = Map::new();
    payload.insert("id".to_string(), Value::String(id.to_string()));
    for scope in entity.cache_scopes() {
        payload.insert(
            snake_to_camel(scope.field),
            Value::String(scope.owner_id.to_string()),
        );
    }

    DomainEvent::new(
        E::deleted_event_type(),
        E::ENTITY_TYPE,
        Some(id),
        Value::Object(payload),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheInvalidationManager, MemoryCache};
    use crate::storage::{InMemoryStorage, StorageOp};
    use crate::testing::{RecordingInvalidator, RecordingSink};
    use coachbase_core::cache::scoped_list_key;
    use coachbase_core::coaching::events::{FOCUS_AREA_CREATED, FOCUS_AREA_DELETED, FOCUS_AREA_UPDATED};
    use coachbase_core::coaching::FocusArea;
    use coachbase_core::storage::StorageErrorKind;

    const TABLE: &str = "focus_areas";

    struct Fixture {
        storage: InMemoryStorage,
        sink: Arc<RecordingSink>,
        invalidator: Arc<RecordingInvalidator>,
        repository: Repository<FocusArea, InMemoryStorage>,
    }

    fn fixture() -> Fixture {
        let storage = InMemoryStorage::new();
        let sink = Arc::new(RecordingSink::default());
        let invalidator = Arc::new(RecordingInvalidator::default());
        let coordinator = Arc::new(TransactionCoordinator::new(
            Arc::new(storage.clone()),
            sink.clone(),
            invalidator.clone(),
        ));
        Fixture {
            storage,
            sink,
            invalidator,
            repository: Repository::new(TABLE, coordinator),
        }
    }

    #[tokio::test]
    async fn test_save_new_entity_publishes_and_invalidates_after_commit() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        let saved = f.repository.save(FocusArea::new(user_id, "Sleep")).await.unwrap();

        let id = saved.id.expect("id assigned on insert");
        let events = f.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, FOCUS_AREA_CREATED);
        assert_eq!(events[0].source_entity_id, Some(id));
        assert_eq!(events[0].payload["userId"], user_id.to_string());

        let calls = f.invalidator.calls();
        assert!(calls.contains(&format!("entity focus_area:{}", id)));
        assert!(calls.contains(&format!("pattern user:{}:focus_area:*", user_id)));
        assert_eq!(f.storage.rows(TABLE).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_publishes_nothing() {
        let f = fixture();
        f.storage.fail_next(StorageOp::Insert, StorageErrorKind::Constraint, 1);

        let err = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::Database { attempts: 1, operation: "save", .. }
        ));
        assert!(f.sink.events().is_empty());
        assert!(f.invalidator.calls().is_empty());
        assert!(f.storage.rows(TABLE).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_insert_failure_succeeds_on_third_attempt() {
        let f = fixture();
        f.storage.fail_next(StorageOp::Insert, StorageErrorKind::Connection, 2);

        let saved = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();

        assert!(saved.id.is_some());
        assert_eq!(f.storage.call_count(StorageOp::Begin), 3);
        assert_eq!(f.sink.event_types(), vec![FOCUS_AREA_CREATED]);
        assert_eq!(f.storage.rows(TABLE).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transient_failure_exhausts_attempts() {
        let f = fixture();
        f.storage.fail_next(StorageOp::Insert, StorageErrorKind::Timeout, 10);

        let err = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Database { attempts: 3, .. }));
        assert_eq!(f.storage.call_count(StorageOp::Insert), 3);
        assert!(f.sink.events().is_empty());
        assert!(f.invalidator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entity_never_reaches_storage() {
        let f = fixture();

        let err = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "   "))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(f.storage.call_count(StorageOp::Begin), 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let f = fixture();
        let ghost = FocusArea::new(Uuid::new_v4(), "Sleep").with_id(Uuid::new_v4());

        let err = f.repository.save(ghost).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(f.sink.events().is_empty());
        assert_eq!(f.storage.call_count(StorageOp::Rollback), 1);
    }

    #[tokio::test]
    async fn test_events_are_not_republished_on_second_save() {
        let f = fixture();
        let saved = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();

        f.repository.save(saved).await.unwrap();

        assert_eq!(f.sink.event_types(), vec![FOCUS_AREA_CREATED]);
    }

    #[tokio::test]
    async fn test_queued_events_publish_in_order_with_assigned_id() {
        let f = fixture();
        let mut focus_area = FocusArea::new(Uuid::new_v4(), "Sleep");
        focus_area.rename("Rest").unwrap();
        focus_area.set_priority(5).unwrap();

        let saved = f.repository.save(focus_area).await.unwrap();

        let id = saved.id.unwrap();
        let events = f.sink.events();
        assert_eq!(
            events.iter().map(|e| e.event_type.as_str()).collect::<Vec<_>>(),
            vec![FOCUS_AREA_CREATED, FOCUS_AREA_UPDATED, FOCUS_AREA_UPDATED]
        );
        assert!(events.iter().all(|e| e.source_entity_id == Some(id)));
        assert_eq!(events[1].payload["changes"]["name"]["to"], "Rest");
        assert_eq!(events[2].payload["changes"]["priority"]["to"], 5);
    }

    #[tokio::test]
    async fn test_failed_save_drops_every_queued_event() {
        let f = fixture();
        f.storage.fail_next(StorageOp::Insert, StorageErrorKind::Constraint, 1);
        let mut focus_area = FocusArea::new(Uuid::new_v4(), "Sleep");
        focus_area.rename("Rest").unwrap();
        focus_area.set_priority(5).unwrap();

        let err = f.repository.save(focus_area).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Database { attempts: 1, .. }));
        assert!(f.sink.events().is_empty());
        assert!(f.invalidator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_update_drops_every_queued_event() {
        let f = fixture();
        let mut saved = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();
        let invalidations = f.invalidator.calls().len();
        saved.rename("Rest").unwrap();
        saved.set_priority(1).unwrap();
        f.storage.fail_next(StorageOp::Update, StorageErrorKind::Constraint, 1);

        assert!(f.repository.save(saved).await.is_err());

        assert_eq!(f.sink.event_types(), vec![FOCUS_AREA_CREATED]);
        assert_eq!(f.invalidator.calls().len(), invalidations);
    }

    #[tokio::test]
    async fn test_owner_change_invalidates_previous_owner() {
        let f = fixture();
        let old_owner = Uuid::new_v4();
        let new_owner = Uuid::new_v4();
        let mut saved = f
            .repository
            .save(FocusArea::new(old_owner, "Sleep"))
            .await
            .unwrap();

        saved.user_id = new_owner;
        f.repository.save(saved).await.unwrap();

        let moved = f.invalidator.changes().pop().unwrap();
        assert_eq!(moved.changed_fields, vec!["user_id"]);
        let calls = f.invalidator.calls();
        assert!(calls.contains(&format!("pattern user:{}:focus_area:*", old_owner)));
        assert!(calls.contains(&format!("pattern user:{}:focus_area:*", new_owner)));
    }

    #[tokio::test]
    async fn test_update_without_owner_change_has_no_changed_fields() {
        let f = fixture();
        let mut saved = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();

        saved.rename("Rest").unwrap();
        f.repository.save(saved).await.unwrap();

        let renamed = f.invalidator.changes().pop().unwrap();
        assert!(renamed.changed_fields.is_empty());
        assert_eq!(renamed.scopes.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_emits_deletion_event_with_owner() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let saved = f.repository.save(FocusArea::new(user_id, "Sleep")).await.unwrap();
        let id = saved.id.unwrap();

        let outcome = f.repository.delete(&id.to_string()).await.unwrap();

        assert_eq!(outcome, DeleteOutcome { deleted: true, id });
        let deleted = f.sink.events().pop().unwrap();
        assert_eq!(deleted.event_type, FOCUS_AREA_DELETED);
        assert_eq!(deleted.source_entity_id, Some(id));
        assert_eq!(
            deleted.payload,
            serde_json::json!({"id": id.to_string(), "userId": user_id.to_string()})
        );
        assert_eq!(f.invalidator.changed_ids(), vec![Some(id), Some(id)]);
        assert!(f.repository.find_by_id(&id.to_string(), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_entity() {
        let f = fixture();

        let err = f
            .repository
            .delete(&Uuid::new_v4().to_string())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(f.sink.events().is_empty());
        assert!(f.invalidator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_missing() {
        let f = fixture();
        let missing = Uuid::new_v4().to_string();

        assert!(f.repository.find_by_id(&missing, false).await.unwrap().is_none());
        let err = f.repository.find_by_id(&missing, true).await.unwrap_err();
        assert_eq!(err, RepositoryError::not_found("focus_area", &missing));
    }

    #[tokio::test]
    async fn test_find_by_id_rejects_malformed_id_before_io() {
        let f = fixture();

        let err = f.repository.find_by_id("not-a-uuid", false).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(f.storage.call_count(StorageOp::Select), 0);
    }

    #[tokio::test]
    async fn test_find_by_ids_deduplicates_and_skips_missing() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let a = f.repository.save(FocusArea::new(user_id, "A")).await.unwrap();
        let b = f.repository.save(FocusArea::new(user_id, "B")).await.unwrap();
        let a_id = a.id.unwrap().to_string();
        let b_id = b.id.unwrap().to_string();
        let missing = Uuid::new_v4().to_string();

        let found = f
            .repository
            .find_by_ids([&a_id, &b_id, &a_id, &missing])
            .await
            .unwrap();

        let mut ids: Vec<String> = found.iter().map(|fa| fa.id.unwrap().to_string()).collect();
        ids.sort();
        let mut expected = vec![a_id, b_id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_input_skips_storage() {
        let f = fixture();

        let found = f.repository.find_by_ids(Vec::<String>::new()).await.unwrap();

        assert!(found.is_empty());
        assert_eq!(f.storage.call_count(StorageOp::Select), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_read_failure_is_retried() {
        let f = fixture();
        let saved = f
            .repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();
        f.storage.fail_next(StorageOp::Select, StorageErrorKind::Deadlock, 1);

        let found = f
            .repository
            .find_by_id(&saved.id.unwrap().to_string(), true)
            .await
            .unwrap();

        assert_eq!(found.map(|fa| fa.name), Some("Sleep".to_string()));
        assert_eq!(f.storage.call_count(StorageOp::Select), 2);
    }

    fn cached_fixture() -> (InMemoryStorage, Arc<MemoryCache>, Repository<FocusArea, InMemoryStorage>) {
        let storage = InMemoryStorage::new();
        let cache = Arc::new(MemoryCache::new(100));
        let coordinator = Arc::new(TransactionCoordinator::new(
            Arc::new(storage.clone()),
            Arc::new(RecordingSink::default()),
            Arc::new(CacheInvalidationManager::new(cache.clone())),
        ));
        let repository = Repository::new(TABLE, coordinator)
            .with_read_cache(cache.clone(), Some(Duration::from_secs(60)));
        (storage, cache, repository)
    }

    #[tokio::test]
    async fn test_read_cache_serves_second_lookup() {
        let (storage, cache, repository) = cached_fixture();
        let saved = repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();
        let id = saved.id.unwrap();

        repository.find_by_id(&id.to_string(), true).await.unwrap();
        let selects = storage.call_count(StorageOp::Select);
        let again = repository.find_by_id(&id.to_string(), true).await.unwrap();

        assert_eq!(again.map(|fa| fa.name), Some("Sleep".to_string()));
        assert_eq!(storage.call_count(StorageOp::Select), selects);
        assert!(cache.get(&entity_key("focus_area", id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_evicts_cached_entity() {
        let (_storage, cache, repository) = cached_fixture();
        let mut saved = repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();
        let id = saved.id.unwrap();
        repository.find_by_id(&id.to_string(), true).await.unwrap();

        saved.rename("Rest").unwrap();
        repository.save(saved).await.unwrap();

        assert!(cache.get(&entity_key("focus_area", id)).await.unwrap().is_none());
        let reloaded = repository.get(&id.to_string()).await.unwrap();
        assert_eq!(reloaded.name, "Rest");
    }

    #[tokio::test]
    async fn test_owner_change_evicts_previous_owner_list() {
        let (_storage, cache, repository) = cached_fixture();
        let old_owner = Uuid::new_v4();
        let new_owner = Uuid::new_v4();
        let mut saved = repository
            .save(FocusArea::new(old_owner, "Sleep"))
            .await
            .unwrap();
        let old_list = scoped_list_key("user", old_owner, "focus_area", "all");
        let new_list = scoped_list_key("user", new_owner, "focus_area", "all");
        cache.set(&old_list, b"[]", None).await.unwrap();
        cache.set(&new_list, b"[]", None).await.unwrap();

        saved.user_id = new_owner;
        repository.save(saved).await.unwrap();

        assert!(cache.get(&old_list).await.unwrap().is_none());
        assert!(cache.get(&new_list).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_a_miss() {
        let (_storage, cache, repository) = cached_fixture();
        let saved = repository
            .save(FocusArea::new(Uuid::new_v4(), "Sleep"))
            .await
            .unwrap();
        let id = saved.id.unwrap();
        let key = entity_key("focus_area", id);
        cache.set(&key, b"{not json", None).await.unwrap();

        let found = repository.get(&id.to_string()).await.unwrap();

        assert_eq!(found.name, "Sleep");
        let repaired = cache.get(&key).await.unwrap().unwrap();
        assert!(deserialize_value::<FocusArea>(&repaired).is_ok());
    }
}
