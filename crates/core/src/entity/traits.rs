use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::CacheScope;
use crate::event::DomainEvent;

use super::EventQueue;

/// An identity-bearing domain object that can be stored by a repository.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Storage and cache name of the entity type, e.g. `focus_area`.
    const ENTITY_TYPE: &'static str;

    /// Prefix for the entity's event type tags, e.g. `FOCUS_AREA`.
    const EVENT_PREFIX: &'static str;

    /// Returns the storage-assigned id, if any.
    fn id(&self) -> Option<Uuid>;

    /// Writes the id unconditionally. Use [`Entity::assign_id`] instead.
    fn set_id(&mut self, id: Uuid);

    /// Assigns an id once. Returns false and leaves the entity untouched if
    /// an id is already present.
    fn assign_id(&mut self, id: Uuid) -> bool {
        if self.id().is_some() {
            return false;
        }
        self.set_id(id);
        true
    }

    /// Foreign owners whose cached views include this entity.
    fn cache_scopes(&self) -> Vec<CacheScope> {
        Vec::new()
    }

    /// Checks entity-level invariants before any storage I/O.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Event type emitted when an entity of this type is deleted.
    fn deleted_event_type() -> String {
        format!("{}_DELETED", Self::EVENT_PREFIX)
    }
}

/// Capability of accumulating domain events while mutating.
///
/// Mutators call [`HasDomainEvents::add_domain_event`] for every state
/// transition other domains react to. Whoever persists the entity must take
/// the events with [`HasDomainEvents::take_domain_events`] so that saving the
/// same instance twice cannot queue an event twice.
pub trait HasDomainEvents: Entity {
    fn event_queue(&self) -> &EventQueue;

    fn event_queue_mut(&mut self) -> &mut EventQueue;

    /// Queues an event stamped with this entity's id and type.
    fn add_domain_event(&mut self, event_type: &str, payload: Value) {
        let id = self.id();
        self.event_queue_mut()
            .record(event_type, Self::ENTITY_TYPE, id, payload);
    }

    /// Returns a copy of the pending events without clearing them.
    fn domain_events(&self) -> Vec<DomainEvent> {
        self.event_queue().snapshot()
    }

    fn clear_domain_events(&mut self) {
        self.event_queue_mut().clear();
    }

    /// Returns and clears the pending events in one step.
    fn take_domain_events(&mut self) -> Vec<DomainEvent> {
        self.event_queue_mut().drain()
    }
}
