//! Key casing converters between the external (camelCase) field naming used
//! by entities and events and the internal (snake_case) naming of stored rows.
//!
//! Conversion renames object keys recursively through nested objects and
//! arrays. Values are never touched and key order is preserved.
//!
//! For keys that start with a lowercase letter and contain no underscores,
//! `snake_to_camel(camel_to_snake(key)) == key`.

use serde_json::{Map, Value};

/// Converts one camelCase key to snake_case.
///
/// ```
/// use coachbase_core::casing::camel_to_snake;
///
/// assert_eq!(camel_to_snake("focusAreaId"), "focus_area_id");
/// assert_eq!(camel_to_snake("already_snake"), "already_snake");
/// ```
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts one snake_case key to camelCase.
///
/// Leading underscores are kept as they are.
///
/// ```
/// use coachbase_core::casing::snake_to_camel;
///
/// assert_eq!(snake_to_camel("focus_area_id"), "focusAreaId");
/// assert_eq!(snake_to_camel("_meta_data"), "_metaData");
/// ```
pub fn snake_to_camel(key: &str) -> String {
    let body = key.trim_start_matches('_');
    let mut out = String::with_capacity(key.len());
    out.push_str(&key[..key.len() - body.len()]);

    let mut upper_next = false;
    for c in body.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Renames every object key in `value` to snake_case.
pub fn keys_to_snake_case(value: Value) -> Value {
    rename_keys(value, &camel_to_snake)
}

/// Renames every object key in `value` to camelCase.
pub fn keys_to_camel_case(value: Value) -> Value {
    rename_keys(value, &snake_to_camel)
}

/// Converts a whole object map to snake_case keys.
pub fn map_to_snake_case(map: Map<String, Value>) -> Map<String, Value> {
    rename_map(map, &camel_to_snake)
}

/// Converts a whole object map to camelCase keys.
pub fn map_to_camel_case(map: Map<String, Value>) -> Map<String, Value> {
    rename_map(map, &snake_to_camel)
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(rename_map(map, rename)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rename_keys(item, rename))
                .collect(),
        ),
        other => other,
    }
}

fn rename_map(map: Map<String, Value>, rename: &dyn Fn(&str) -> String) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (rename(&key), rename_keys(value, rename)))
        .collect()
}
