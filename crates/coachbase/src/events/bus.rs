//! In-process event bus.
//!
//! Handlers for an event type run one at a time, in registration order, and
//! each one finishes before the next starts. A handler that errors, panics
//! or outlives the configured timeout is logged and counted in the metrics,
//! and the remaining handlers still run. Publishing never fails the caller.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;

use coachbase_core::event::{DomainEvent, EventBusError, EventSink};

use super::handler::{EventHandler, FnHandler, HandlerId};
use super::history::{EventHistory, HistoryFilter};

/// History size used by [`EventBus::default`].
pub const DEFAULT_HISTORY_SIZE: usize = 1_000;

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    handler: Arc<dyn EventHandler>,
}

#[derive(Debug, Clone, Copy, Default)]
struct TypeTotals {
    published: u64,
    total_duration: Duration,
}

#[derive(Debug, Default)]
struct BusStats {
    published: u64,
    handler_failures: u64,
    skipped: u64,
    per_type: HashMap<String, TypeTotals>,
}

/// Publication counters for one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventTypeMetrics {
    pub published: u64,
    /// Mean time spent dispatching one event of this type to its handlers.
    pub average_duration: Duration,
}

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventBusMetrics {
    pub published: u64,
    pub handler_failures: u64,
    /// Events rejected before dispatch because they had no type.
    pub skipped: u64,
    pub per_type: BTreeMap<String, EventTypeMetrics>,
}

struct BusInner {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_handler_id: AtomicU64,
    history: RwLock<EventHistory>,
    stats: Mutex<BusStats>,
}

impl BusInner {
    fn remove(&self, event_type: &str, handler_id: HandlerId) -> bool {
        let Ok(mut handlers) = self.handlers.write() else {
            return false;
        };
        let Some(registered) = handlers.get_mut(event_type) else {
            return false;
        };

        let before = registered.len();
        registered.retain(|registration| registration.id != handler_id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            handlers.remove(event_type);
        }
        removed
    }
}

/// Handle returned by [`EventBus::register`].
///
/// Dropping it keeps the handler registered.
#[derive(Debug)]
pub struct Subscription {
    event_type: String,
    handler_id: HandlerId,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn handler_id(&self) -> HandlerId {
        self.handler_id
    }

    /// Removes the handler. Returns false if it was already removed or the
    /// bus is gone.
    pub fn unsubscribe(self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|inner| inner.remove(&self.event_type, self.handler_id))
    }
}

/// In-process publish/subscribe bus for domain events.
///
/// Clones share handlers, history and metrics. The bus is passed to the
/// components that publish through it; there is no global instance.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
    handler_timeout: Option<Duration>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl EventBus {
    /// Creates a bus that keeps the last `history_max_size` events.
    pub fn new(history_max_size: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(HashMap::new()),
                next_handler_id: AtomicU64::new(1),
                history: RwLock::new(EventHistory::new(history_max_size)),
                stats: Mutex::new(BusStats::default()),
            }),
            handler_timeout: None,
        }
    }

    /// Abandons a handler call that runs longer than `timeout` and counts
    /// it as a failure.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Registers `handler` for `event_type`, after any existing handlers.
    pub fn register(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        let event_type = event_type.into();
        let handler_id = HandlerId(self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            event_type = %event_type,
            handler = %handler_id,
            handler_name = handler.name(),
            "Registering event handler"
        );

        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers
                .entry(event_type.clone())
                .or_default()
                .push(Registration {
                    id: handler_id,
                    handler,
                });
        }

        Subscription {
            event_type,
            handler_id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Registers an async closure as a handler.
    pub fn register_fn<F, Fut>(&self, event_type: impl Into<String>, name: &str, f: F) -> Subscription
    where
        F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(event_type, Arc::new(FnHandler::new(name, f)))
    }

    /// Removes one handler. Returns false if it was not registered.
    pub fn unregister(&self, event_type: &str, handler_id: HandlerId) -> bool {
        let removed = self.inner.remove(event_type, handler_id);
        if removed {
            tracing::debug!(event_type, handler = %handler_id, "Unregistered event handler");
        }
        removed
    }

    /// Event types with at least one handler, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .inner
            .handlers
            .read()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default();
        types.sort();
        types
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.inner
            .handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(event_type).map(Vec::len))
            .unwrap_or(0)
    }

    /// Dispatches `event` to the handlers registered for its type.
    ///
    /// The handler list is captured before the first handler runs, so
    /// registrations made while publishing apply to the next event.
    pub async fn publish(&self, event: DomainEvent) {
        if !event.is_well_formed() {
            tracing::warn!(event_id = %event.id, "Skipping domain event without a type");
            if let Ok(mut stats) = self.inner.stats.lock() {
                stats.skipped += 1;
            }
            return;
        }

        let started = Instant::now();
        self.record(&event);

        let handlers: Vec<Registration> = self
            .inner
            .handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(&event.event_type).cloned())
            .unwrap_or_default();

        let mut failures = 0u64;
        for registration in &handlers {
            if let Err(reason) = self.invoke(registration, &event).await {
                failures += 1;
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    handler = %registration.id,
                    handler_name = registration.handler.name(),
                    error = %reason,
                    "Event handler failed"
                );
            }
        }

        let elapsed = started.elapsed();
        if let Ok(mut stats) = self.inner.stats.lock() {
            stats.published += 1;
            stats.handler_failures += failures;
            let totals = stats.per_type.entry(event.event_type.clone()).or_default();
            totals.published += 1;
            totals.total_duration += elapsed;
        }

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            correlation_id = %event.correlation_id,
            handlers = handlers.len(),
            failures,
            "Published domain event"
        );
    }

    async fn invoke(&self, registration: &Registration, event: &DomainEvent) -> Result<(), String> {
        let call = AssertUnwindSafe(registration.handler.handle(event)).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(format!("timed out after {:?}", limit)),
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    fn record(&self, event: &DomainEvent) {
        if let Ok(mut history) = self.inner.history.write() {
            history.push(event.clone());
        }
    }

    /// Published events matching `filter`, oldest first.
    pub fn history(&self, filter: &HistoryFilter) -> Vec<DomainEvent> {
        self.inner
            .history
            .read()
            .map(|history| history.query(filter))
            .unwrap_or_default()
    }

    pub fn clear_history(&self) {
        if let Ok(mut history) = self.inner.history.write() {
            history.clear();
        }
    }

    pub fn metrics(&self) -> EventBusMetrics {
        let Ok(stats) = self.inner.stats.lock() else {
            return EventBusMetrics::default();
        };

        let per_type = stats
            .per_type
            .iter()
            .map(|(event_type, totals)| {
                let average_duration = u32::try_from(totals.published)
                    .ok()
                    .filter(|count| *count > 0)
                    .map(|count| totals.total_duration / count)
                    .unwrap_or_default();
                (
                    event_type.clone(),
                    EventTypeMetrics {
                        published: totals.published,
                        average_duration,
                    },
                )
            })
            .collect();

        EventBusMetrics {
            published: stats.published,
            handler_failures: stats.handler_failures,
            skipped: stats.skipped,
            per_type,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn publish(&self, event: DomainEvent) -> Result<(), EventBusError> {
        EventBus::publish(self, event).await;
        Ok(())
    }
}
