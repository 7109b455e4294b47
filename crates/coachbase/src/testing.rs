//! Recording collaborators shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use coachbase_core::cache::{self, CacheError, CacheInvalidator, ChangedEntity};
use coachbase_core::event::{DomainEvent, EventBusError, EventSink};

/// Event sink that keeps every published event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn fail_publishes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: DomainEvent) -> Result<(), EventBusError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EventBusError::Unavailable("sink offline".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Records each primitive invalidation call as a readable line. Expansion
/// of a `ChangedEntity` is left to the trait's provided method.
#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl CallLog {
    fn record(&self, call: String) -> cache::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionFailed("cache offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheInvalidator for CallLog {
    async fn invalidate_entity(&self, entity_type: &str, id: Uuid) -> cache::Result<()> {
        self.record(format!("entity {}", cache::entity_key(entity_type, id)))
    }

    async fn invalidate_pattern(&self, pattern: &str) -> cache::Result<()> {
        self.record(format!("pattern {}", pattern))
    }

    async fn invalidate_list_caches(&self, entity_type: &str) -> cache::Result<()> {
        self.record(format!("lists {}", entity_type))
    }
}

/// Invalidator that keeps every `ChangedEntity` it receives and logs the
/// primitive calls they expand to.
#[derive(Default)]
pub struct RecordingInvalidator {
    changes: Mutex<Vec<ChangedEntity>>,
    log: CallLog,
}

impl RecordingInvalidator {
    pub fn fail_invalidations(&self) {
        self.log.fail.store(true, Ordering::SeqCst);
    }

    pub fn changed_ids(&self) -> Vec<Option<Uuid>> {
        self.changes.lock().unwrap().iter().map(|c| c.id).collect()
    }

    pub fn changes(&self) -> Vec<ChangedEntity> {
        self.changes.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate_entity(&self, entity_type: &str, id: Uuid) -> cache::Result<()> {
        self.log.invalidate_entity(entity_type, id).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> cache::Result<()> {
        self.log.invalidate_pattern(pattern).await
    }

    async fn invalidate_list_caches(&self, entity_type: &str) -> cache::Result<()> {
        self.log.invalidate_list_caches(entity_type).await
    }

    async fn invalidate_changed(&self, changed: &ChangedEntity) -> cache::Result<()> {
        self.changes.lock().unwrap().push(changed.clone());
        self.log.invalidate_changed(changed).await
    }
}
