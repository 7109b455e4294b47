use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An immutable record of something that happened to an entity.
///
/// Events are queued on the entity that produced them and handed to the
/// event bus only after the write that carries them has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub id: Uuid,
    /// Event type tag, e.g. `FOCUS_AREA_CREATED`.
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    /// `None` while the source entity has not been assigned an id yet.
    pub source_entity_id: Option<Uuid>,
    pub source_entity_type: String,
    pub payload: Value,
}

impl DomainEvent {
    /// Creates a new event stamped with the current time and a fresh correlation id.
    pub fn new(
        event_type: impl Into<String>,
        source_entity_type: impl Into<String>,
        source_entity_id: Option<Uuid>,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: Uuid::new_v4(),
            source_entity_id,
            source_entity_type: source_entity_type.into(),
            payload,
        }
    }

    /// Sets the correlation id for this event.
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Returns true if the event carries a usable type tag.
    pub fn is_well_formed(&self) -> bool {
        !self.event_type.trim().is_empty()
    }

    /// Fills in the source entity id if the event was queued before one existed.
    ///
    /// An id that is already present is never replaced.
    pub fn stamp_source_id(&mut self, id: Uuid) {
        if self.source_entity_id.is_none() {
            self.source_entity_id = Some(id);
        }
    }

    /// Looks up a top-level field of the payload.
    pub fn payload_field(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }
}
