//! Error type for the storage layer.
//!
//! Repository lookups that find nothing return `Ok(None)`; the variants
//! here are reserved for real failures.

use rusqlite::ErrorCode;
use std::path::PathBuf;

use super::models::SessionStatus;

/// Result alias used throughout the storage layer.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the store and its repositories.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened, keyed, configured, or closed.
    #[error("Failed to open database at {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A migration statement failed.
    #[error("Schema migration failed: {0}")]
    Schema(#[source] rusqlite::Error),

    /// A write broke a uniqueness, foreign-key, or check constraint.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The connection lock was not acquired within the configured bound.
    #[error("Database is busy; lock not acquired within the configured timeout")]
    Busy,

    /// A record failed validation before reaching the database.
    #[error("Invalid record: {0}")]
    Invalid(String),

    /// A record required by an operation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The session lifecycle does not allow this status change.
    #[error("Session cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Any other engine failure, propagated unchanged.
    #[error("Database error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn connection(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StoreError::Connection {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True when the caller may retry the operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => StoreError::Constraint(err.to_string()),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Busy,
            _ => StoreError::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some(message.to_string()))
    }

    #[test]
    fn test_constraint_failures_are_classified() {
        let err: StoreError =
            sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT, "UNIQUE constraint failed").into();
        assert!(matches!(err, StoreError::Constraint(ref msg) if msg.contains("UNIQUE")));
    }

    #[test]
    fn test_busy_failures_are_retryable() {
        let err: StoreError = sqlite_failure(rusqlite::ffi::SQLITE_BUSY, "database is locked").into();
        assert!(matches!(err, StoreError::Busy));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_failures_pass_through() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transition_error_names_both_states() {
        let err = StoreError::InvalidTransition {
            from: SessionStatus::Completed,
            to: SessionStatus::Active,
        };
        let text = err.to_string();
        assert!(text.contains("completed"));
        assert!(text.contains("active"));
    }
}
