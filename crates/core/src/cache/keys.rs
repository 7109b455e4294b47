//! Cache key and pattern builders.
//!
//! Layout:
//! - `{entity_type}:{id}` for one entity
//! - `{entity_type}:list:{query}` for unscoped lists of a type
//! - `{owner_type}:{owner_id}:{entity_type}:{query}` for lists owned by someone
//! - `leaderboard:{board}` for aggregates

use uuid::Uuid;

/// Returns the cache key for a single entity.
pub fn entity_key(entity_type: &str, id: Uuid) -> String {
    format!("{}:{}", entity_type, id)
}

/// Returns the cache key for an unscoped list query.
pub fn entity_list_key(entity_type: &str, query: &str) -> String {
    format!("{}:list:{}", entity_type, query)
}

/// Returns the pattern matching every unscoped list of an entity type.
pub fn entity_list_pattern(entity_type: &str) -> String {
    format!("{}:list:*", entity_type)
}

/// Returns the cache key for a list of entities owned by someone.
pub fn scoped_list_key(owner_type: &str, owner_id: Uuid, entity_type: &str, query: &str) -> String {
    format!("{}:{}:{}:{}", owner_type, owner_id, entity_type, query)
}

/// Returns the pattern matching every list of `entity_type` owned by the owner.
pub fn scoped_list_pattern(owner_type: &str, owner_id: Uuid, entity_type: &str) -> String {
    format!("{}:{}:{}:*", owner_type, owner_id, entity_type)
}

/// Returns the pattern matching every scoped cache of an owner.
pub fn owner_pattern(owner_type: &str, owner_id: Uuid) -> String {
    format!("{}:{}:*", owner_type, owner_id)
}

/// Returns the cache key for a leaderboard.
pub fn leaderboard_key(board: &str) -> String {
    format!("leaderboard:{}", board)
}

/// Returns the pattern matching every leaderboard.
pub fn leaderboard_pattern() -> String {
    "leaderboard:*".to_string()
}

/// Returns the set key that tracks every scoped key of an owner.
pub fn scope_tracking_key(owner_type: &str, owner_id: Uuid) -> String {
    format!("{}:{}:_keys", owner_type, owner_id)
}

/// Extracts `(owner_type, owner_id)` from a scoped list key or pattern.
///
/// Single-entity keys (`focus_area:{id}`) have no scope and return `None`,
/// as do patterns with a wildcard in the owner position.
///
/// # Examples
///
/// ```
/// use coachbase_core::cache::extract_scope;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// let key = format!("user:{}:focus_area:all", id);
/// assert_eq!(extract_scope(&key), Some(("user", id)));
///
/// assert_eq!(extract_scope(&format!("focus_area:{}", id)), None);
/// assert_eq!(extract_scope("user:*:focus_area:*"), None);
/// ```
pub fn extract_scope(key: &str) -> Option<(&str, Uuid)> {
    let mut parts = key.splitn(3, ':');
    let owner_type = parts.next()?;
    let owner_id = Uuid::parse_str(parts.next()?).ok()?;
    // A scope needs something after the owner.
    parts.next().filter(|rest| !rest.is_empty())?;
    Some((owner_type, owner_id))
}
