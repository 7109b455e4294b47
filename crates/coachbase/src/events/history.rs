use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use coachbase_core::event::DomainEvent;

/// Selects events from the bus history. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub event_type: Option<String>,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn source(mut self, entity_type: impl Into<String>, id: Option<Uuid>) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = id;
        self
    }

    pub fn correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, event: &DomainEvent) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|t| event.event_type == t)
            && self
                .source_entity_type
                .as_deref()
                .is_none_or(|t| event.source_entity_type == t)
            && self
                .source_entity_id
                .is_none_or(|id| event.source_entity_id == Some(id))
            && self
                .correlation_id
                .is_none_or(|id| event.correlation_id == id)
            && self.since.is_none_or(|since| event.timestamp >= since)
    }
}

/// Bounded log of published events, oldest first.
#[derive(Debug)]
pub(super) struct EventHistory {
    events: VecDeque<DomainEvent>,
    max_size: usize,
}

impl EventHistory {
    pub(super) fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    pub(super) fn push(&mut self, event: DomainEvent) {
        self.events.push_back(event);
        while self.events.len() > self.max_size {
            self.events.pop_front();
        }
    }

    pub(super) fn query(&self, filter: &HistoryFilter) -> Vec<DomainEvent> {
        let mut matches: Vec<DomainEvent> = self
            .events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            let excess = matches.len().saturating_sub(limit);
            matches.drain(..excess);
        }
        matches
    }

    pub(super) fn clear(&mut self) {
        self.events.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str) -> DomainEvent {
        DomainEvent::new(event_type, "focus_area", Some(Uuid::new_v4()), json!({}))
    }

    #[test]
    fn test_history_drops_oldest_beyond_max_size() {
        let mut history = EventHistory::new(2);
        let first = event("A");
        let second = event("B");
        let third = event("C");

        history.push(first);
        history.push(second.clone());
        history.push(third.clone());

        assert_eq!(history.len(), 2);
        assert_eq!(history.query(&HistoryFilter::new()), vec![second, third]);
    }

    #[test]
    fn test_zero_max_size_keeps_nothing() {
        let mut history = EventHistory::new(0);
        history.push(event("A"));

        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_limit_keeps_most_recent_matches() {
        let mut history = EventHistory::new(10);
        let events: Vec<DomainEvent> = ["A", "B", "A", "A"].iter().map(|t| event(t)).collect();
        for e in &events {
            history.push(e.clone());
        }

        let found = history.query(&HistoryFilter::new().event_type("A").limit(2));

        assert_eq!(found, vec![events[2].clone(), events[3].clone()]);
    }

    #[test]
    fn test_filter_by_source_and_correlation() {
        let correlation = Uuid::new_v4();
        let target = event("A").with_correlation_id(correlation);
        let other = event("A");

        let by_source = HistoryFilter::new().source("focus_area", target.source_entity_id);
        let by_correlation = HistoryFilter::new().correlation_id(correlation);

        assert!(by_source.matches(&target));
        assert!(!by_source.matches(&other));
        assert!(by_correlation.matches(&target));
        assert!(!by_correlation.matches(&other));
        assert!(!HistoryFilter::new().source("challenge", None).matches(&target));
    }
}
