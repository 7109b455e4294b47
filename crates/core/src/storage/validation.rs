//! Fail-fast input checks that run before any storage I/O.

use uuid::Uuid;

use super::{RepositoryError, Result};

/// Parses and checks an entity id supplied by a caller.
///
/// Blank, malformed and nil ids are rejected with a validation error.
pub fn validate_id(entity_type: &'static str, operation: &'static str, raw: &str) -> Result<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RepositoryError::validation(
            entity_type,
            operation,
            "id is required",
        ));
    }

    let id = Uuid::parse_str(trimmed).map_err(|_| {
        RepositoryError::validation(entity_type, operation, format!("invalid id: {trimmed}"))
    })?;

    if id.is_nil() {
        return Err(RepositoryError::validation(
            entity_type,
            operation,
            "id must not be nil",
        ));
    }

    Ok(id)
}

/// Checks that every named parameter is present and not blank.
///
/// All missing names are reported together, in the order given.
pub fn validate_required_params(
    entity_type: &'static str,
    operation: &'static str,
    params: &[(&str, Option<&str>)],
) -> Result<()> {
    let missing: Vec<&str> = params
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(RepositoryError::validation(
        entity_type,
        operation,
        format!("missing required parameter(s): {}", missing.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_id() {
        let id = Uuid::new_v4();
        assert_eq!(validate_id("focus_area", "find", &id.to_string()), Ok(id));
    }

    #[test]
    fn test_id_is_trimmed() {
        let id = Uuid::new_v4();
        assert_eq!(
            validate_id("focus_area", "find", &format!("  {id} ")),
            Ok(id)
        );
    }

    #[test]
    fn test_blank_id_rejected() {
        let error = validate_id("focus_area", "find", "   ").unwrap_err();
        assert_eq!(
            error,
            RepositoryError::validation("focus_area", "find", "id is required")
        );
    }

    #[test]
    fn test_malformed_id_rejected() {
        let error = validate_id("challenge", "delete", "abc").unwrap_err();
        assert!(error.is_validation());
        assert_eq!(error.operation(), Some("delete"));
    }

    #[test]
    fn test_nil_id_rejected() {
        let error = validate_id("challenge", "delete", &Uuid::nil().to_string()).unwrap_err();
        assert!(error.is_validation());
    }

    #[test]
    fn test_required_params_present() {
        let result = validate_required_params(
            "focus_area",
            "create",
            &[("user_id", Some("u1")), ("name", Some("Sleep"))],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_required_params_lists_every_missing_name() {
        let error = validate_required_params(
            "focus_area",
            "create",
            &[("user_id", None), ("name", Some("  ")), ("color", Some("blue"))],
        )
        .unwrap_err();

        assert_eq!(
            error,
            RepositoryError::validation(
                "focus_area",
                "create",
                "missing required parameter(s): user_id, name"
            )
        );
    }
}
