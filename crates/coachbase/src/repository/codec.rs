//! Entity to row conversion.
//!
//! Entities serialize with camelCase keys; rows use snake_case columns.

use serde_json::Value;

use coachbase_core::casing::{map_to_camel_case, map_to_snake_case};
use coachbase_core::entity::Entity;
use coachbase_core::storage::{RepositoryError, Result, Row};

/// Serializes an entity into a storage row.
///
/// An unassigned id is left out so the storage assigns one.
pub fn encode_entity<E: Entity>(entity: &E) -> Result<Row> {
    let value = serde_json::to_value(entity)
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

    let Value::Object(map) = value else {
        return Err(RepositoryError::Serialization(format!(
            "{} did not serialize to an object",
            E::ENTITY_TYPE
        )));
    };

    let mut row = map_to_snake_case(map);
    if row.get("id").is_some_and(Value::is_null) {
        row.shift_remove("id");
    }
    Ok(row)
}

/// Deserializes a storage row into an entity.
pub fn decode_row<E: Entity>(row: Row) -> Result<E> {
    serde_json::from_value(Value::Object(map_to_camel_case(row)))
        .map_err(|e| RepositoryError::Serialization(format!("invalid {} row: {}", E::ENTITY_TYPE, e)))
}
