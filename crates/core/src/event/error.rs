use thiserror::Error;

/// Errors an event sink can report when handing an event on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Failed to publish event {event_id}: {message}")]
    PublishFailed { event_id: String, message: String },
    #[error("Event sink unavailable: {0}")]
    Unavailable(String),
}
