//! Coachbase persistence runtime.
//!
//! Repositories write through a [`transaction::TransactionCoordinator`] that
//! retries transient storage failures and, once a write commits, publishes
//! the entity's domain events and invalidates its caches. The pure contracts
//! (entities, events, errors, cache keys) live in `coachbase_core`.

pub mod cache;
pub mod config;
pub mod events;
pub mod repository;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError};
