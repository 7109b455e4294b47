//! Pure functions for mapping repository errors to HTTP status codes.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `NotFound` -> 404 (Not Found)
/// - `Database` -> 500 (Internal Server Error)
/// - `Storage` -> 503 when transient, 500 otherwise
/// - `Transaction` / `Serialization` -> 500
///
/// # Examples
///
/// ```
/// use coachbase_core::storage::{repository_error_to_status_code, RepositoryError};
///
/// let error = RepositoryError::not_found("focus_area", "abc-123");
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::Validation { .. } => 400,
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::Database { .. } => 500,
        RepositoryError::Storage(source) if source.is_transient() => 503,
        RepositoryError::Storage(_) => 500,
        RepositoryError::Transaction { .. } => 500,
        RepositoryError::Serialization(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, StorageErrorKind};

    #[test]
    fn test_validation_maps_to_400() {
        let error = RepositoryError::validation("focus_area", "save", "name is required");
        assert_eq!(repository_error_to_status_code(&error), 400);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let error = RepositoryError::not_found("challenge", "c-1");
        assert_eq!(repository_error_to_status_code(&error), 404);
    }

    #[test]
    fn test_database_maps_to_500() {
        let error = RepositoryError::Database {
            entity_type: "challenge",
            operation: "save",
            attempts: 3,
            source: StorageError::new(StorageErrorKind::Connection, "refused"),
        };
        assert_eq!(repository_error_to_status_code(&error), 500);
    }

    #[test]
    fn test_transient_storage_maps_to_503() {
        let error = RepositoryError::Storage(StorageError::new(StorageErrorKind::RateLimited, "slow down"));
        assert_eq!(repository_error_to_status_code(&error), 503);
    }

    #[test]
    fn test_permanent_storage_maps_to_500() {
        let error = RepositoryError::Storage(StorageError::new(StorageErrorKind::Constraint, "fk"));
        assert_eq!(repository_error_to_status_code(&error), 500);
    }
}
