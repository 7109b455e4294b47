use serde_json::Value;
use uuid::Uuid;

use crate::event::DomainEvent;

/// Pending domain events held by an entity until it is persisted.
///
/// The queue is a plain in-memory list. It never talks to the event bus;
/// repositories drain it and hand the events over themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQueue {
    events: Vec<DomainEvent>,
    correlation_id: Option<Uuid>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue whose events all share one correlation id.
    pub fn correlated(correlation_id: Uuid) -> Self {
        Self {
            events: Vec::new(),
            correlation_id: Some(correlation_id),
        }
    }

    /// Sets the correlation id used for events queued from now on.
    pub fn set_correlation_id(&mut self, correlation_id: Uuid) {
        self.correlation_id = Some(correlation_id);
    }

    /// Queues a new event for the given source.
    pub fn record(
        &mut self,
        event_type: &str,
        source_entity_type: &str,
        source_entity_id: Option<Uuid>,
        payload: Value,
    ) {
        let mut event = DomainEvent::new(event_type, source_entity_type, source_entity_id, payload);
        if let Some(correlation_id) = self.correlation_id {
            event = event.with_correlation_id(correlation_id);
        }
        self.events.push(event);
    }

    /// Returns a copy of the pending events, oldest first.
    pub fn snapshot(&self) -> Vec<DomainEvent> {
        self.events.clone()
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Removes and returns every pending event, oldest first.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_insertion_order() {
        let mut queue = EventQueue::new();
        queue.record("A", "focus_area", None, json!({}));
        queue.record("B", "focus_area", None, json!({}));

        let types: Vec<String> = queue.snapshot().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec!["A", "B"]);
    }

    #[test]
    fn test_snapshot_does_not_clear() {
        let mut queue = EventQueue::new();
        queue.record("A", "focus_area", None, json!({}));

        let _ = queue.snapshot();

        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::new();
        queue.record("A", "focus_area", None, json!({}));

        let drained = queue.drain();

        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_correlated_queue_stamps_every_event() {
        let correlation_id = Uuid::new_v4();
        let mut queue = EventQueue::correlated(correlation_id);
        queue.record("A", "challenge", None, json!({}));
        queue.record("B", "challenge", None, json!({}));

        assert!(queue
            .snapshot()
            .iter()
            .all(|e| e.correlation_id == correlation_id));
    }

    #[test]
    fn test_uncorrelated_events_get_distinct_ids() {
        let mut queue = EventQueue::new();
        queue.record("A", "challenge", None, json!({}));
        queue.record("B", "challenge", None, json!({}));

        let events = queue.snapshot();
        assert_ne!(events[0].correlation_id, events[1].correlation_id);
    }
}
