use std::fmt;

use thiserror::Error;

/// Structured classification of a storage failure, supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    Connection,
    Timeout,
    Deadlock,
    RateLimited,
    Unavailable,
    /// Unique key or optimistic concurrency violation.
    Conflict,
    Constraint,
    InvalidQuery,
    Other,
}

impl StorageErrorKind {
    /// Returns true for failures expected to clear up on a later attempt.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            StorageErrorKind::Connection
                | StorageErrorKind::Timeout
                | StorageErrorKind::Deadlock
                | StorageErrorKind::RateLimited
                | StorageErrorKind::Unavailable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageErrorKind::Connection => "connection",
            StorageErrorKind::Timeout => "timeout",
            StorageErrorKind::Deadlock => "deadlock",
            StorageErrorKind::RateLimited => "rate_limited",
            StorageErrorKind::Unavailable => "unavailable",
            StorageErrorKind::Conflict => "conflict",
            StorageErrorKind::Constraint => "constraint",
            StorageErrorKind::InvalidQuery => "invalid_query",
            StorageErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the storage client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} error: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Result type for storage client calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by repositories.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("Invalid {entity_type} input for {operation}: {message}")]
    Validation {
        entity_type: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error("Database error during {operation} on {entity_type} after {attempts} attempt(s): {source}")]
    Database {
        entity_type: &'static str,
        operation: &'static str,
        attempts: u32,
        source: StorageError,
    },
    /// Raw storage failure inside an attempt, before retries are settled.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Transaction error during {operation}: {message}")]
    Transaction {
        operation: &'static str,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn validation(
        entity_type: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        RepositoryError::Validation {
            entity_type,
            operation,
            message: message.into(),
        }
    }

    /// Settles an error once the retry executor has stopped.
    ///
    /// Raw storage failures become [`RepositoryError::Database`] carrying the
    /// attempt count; every other variant passes through verbatim.
    pub fn into_settled(
        self,
        entity_type: &'static str,
        operation: &'static str,
        attempts: u32,
    ) -> Self {
        match self {
            RepositoryError::Storage(source) => RepositoryError::Database {
                entity_type,
                operation,
                attempts,
                source,
            },
            other => other,
        }
    }

    pub fn entity_type(&self) -> Option<&'static str> {
        match self {
            RepositoryError::NotFound { entity_type, .. }
            | RepositoryError::Validation { entity_type, .. }
            | RepositoryError::Database { entity_type, .. } => Some(entity_type),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            RepositoryError::Validation { operation, .. }
            | RepositoryError::Database { operation, .. }
            | RepositoryError::Transaction { operation, .. } => Some(operation),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RepositoryError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    pub fn is_database(&self) -> bool {
        matches!(self, RepositoryError::Database { .. })
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
