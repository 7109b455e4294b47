use async_trait::async_trait;

use super::{DomainEvent, EventBusError};

/// Destination for domain events released after a successful commit.
///
/// Repositories receive a sink at construction time instead of reaching for
/// a shared global bus.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hands one event to the sink.
    async fn publish(&self, event: DomainEvent) -> Result<(), EventBusError>;
}
