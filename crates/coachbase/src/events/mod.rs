//! In-process domain event bus.
//!
//! Handlers subscribe by event type and are invoked sequentially in
//! registration order. A failing, panicking or timed-out handler is logged
//! and counted; it never stops the remaining handlers or the publisher.

mod bus;
mod handler;
mod history;

pub use bus::{EventBus, EventBusMetrics, EventTypeMetrics, Subscription, DEFAULT_HISTORY_SIZE};
pub use handler::{EventHandler, FnHandler, HandlerId};
pub use history::HistoryFilter;
