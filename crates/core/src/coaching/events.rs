//! Event type tags raised by coaching entities.

pub const FOCUS_AREA_CREATED: &str = "FOCUS_AREA_CREATED";
pub const FOCUS_AREA_UPDATED: &str = "FOCUS_AREA_UPDATED";
pub const FOCUS_AREA_ARCHIVED: &str = "FOCUS_AREA_ARCHIVED";
pub const FOCUS_AREA_DELETED: &str = "FOCUS_AREA_DELETED";

pub const CHALLENGE_CREATED: &str = "CHALLENGE_CREATED";
pub const CHALLENGE_COMPLETED: &str = "CHALLENGE_COMPLETED";
pub const CHALLENGE_ABANDONED: &str = "CHALLENGE_ABANDONED";
pub const CHALLENGE_DELETED: &str = "CHALLENGE_DELETED";
