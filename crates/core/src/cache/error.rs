use thiserror::Error;

use super::SerializationError;

/// Failures reported by a cache backend.
///
/// Cache failures never fail a repository call: reads treat them as a miss
/// and post-commit invalidation only logs and counts them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    /// The backend rejected a command.
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// True when retrying against the same backend could succeed.
    pub fn is_connection(&self) -> bool {
        matches!(self, CacheError::ConnectionFailed(_))
    }
}

impl From<SerializationError> for CacheError {
    fn from(err: SerializationError) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
