//! In-memory storage backend for testing.
//!
//! Tables are JSON rows behind an `Arc<RwLock<_>>`. Transactions stage their
//! writes and apply them in one step on commit. Faults can be scheduled per
//! operation to exercise retry and rollback paths.
//!
//! # Example
//!
//! ```rust,ignore
//! use coachbase::storage::{InMemoryStorage, StorageOp};
//! use coachbase_core::storage::StorageErrorKind;
//!
//! let storage = InMemoryStorage::new();
//! storage.fail_next(StorageOp::Insert, StorageErrorKind::Timeout, 2);
//! ```

mod client;
mod faults;

pub use client::{InMemoryStorage, InMemoryTransaction};
pub use faults::StorageOp;
