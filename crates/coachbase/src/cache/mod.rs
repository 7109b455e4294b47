//! Cache backends and the write-path invalidation manager.
//!
//! The traits live in `coachbase_core::cache`. The in-memory backend is
//! always compiled; the Redis backend needs the `redis` feature.

mod invalidation;
pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_impl;

pub use invalidation::{CacheInvalidationManager, InvalidationStats};
pub use memory::MemoryCache;

#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
