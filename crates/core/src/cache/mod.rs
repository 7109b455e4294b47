mod error;
mod keys;
mod patterns;
mod rules;
mod serialization;
mod traits;
mod types;

pub use error::{CacheError, Result};
pub use keys::{
    entity_key, entity_list_key, entity_list_pattern, extract_scope, leaderboard_key,
    leaderboard_pattern, owner_pattern, scope_tracking_key, scoped_list_key, scoped_list_pattern,
};
pub use patterns::{is_glob, pattern_matches};
pub use rules::{render_template, CacheInvalidationRule};
pub use serialization::{deserialize_value, serialize_value, SerializationError};
pub use traits::{Cache, CacheInvalidator};
pub use types::{CacheScope, ChangedEntity};
