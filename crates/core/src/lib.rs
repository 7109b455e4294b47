//! Functional core of the coachbase persistence layer.
//!
//! Everything here is pure: types, traits for the collaborators the
//! repositories talk to, and the functions that decide what a write means
//! (which events, which cache keys, whether a failure is worth retrying).
//! The `coachbase` crate supplies the I/O.

pub mod cache;
pub mod casing;
pub mod coaching;
pub mod entity;
pub mod event;
pub mod retry;
pub mod storage;
