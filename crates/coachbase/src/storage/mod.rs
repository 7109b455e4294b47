//! Storage backends.
//!
//! Repositories are written against `coachbase_core::storage::StorageClient`.
//! The in-memory backend here is used by the demo binary and by tests; a
//! database-backed client implements the same trait.

pub mod inmemory;

pub use inmemory::{InMemoryStorage, InMemoryTransaction, StorageOp};
