//! Error types for doclib-dl
//!
//! Domain-specific error enums with a crate-wide [`Result`] alias. Worker
//! failures never propagate out of the scheduler; they are persisted on the
//! job row. These types cover the synchronous surface (enqueue/cancel/retry)
//! and the store/transfer internals.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for doclib-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for doclib-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "library_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Invalid priority label on enqueue (must be low|normal|high)
    #[error("invalid priority: {0:?} (expected low, normal, or high)")]
    InvalidPriority(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Manager already running or already stopped
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Download not found in the job store
    #[error("download {id} not found")]
    NotFound {
        /// The download ID that was not found
        id: i64,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} download {id} in state {current_state}")]
    InvalidState {
        /// The download ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "retry")
        operation: String,
        /// The current state that prevents the operation (e.g., "completed")
        current_state: String,
    },

    /// URL rejected at enqueue time
    #[error("invalid download URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Remote server answered with a non-success status
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus {
        /// The HTTP status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// Destination file could not be finalized
    #[error("failed to finalize {}: {reason}", path.display())]
    Finalize {
        /// The target path that could not be written
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_message_names_operation_and_state() {
        let err = Error::Download(DownloadError::InvalidState {
            id: 7,
            operation: "retry".to_string(),
            current_state: "completed".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("retry"), "message should name the operation: {msg}");
        assert!(msg.contains("completed"), "message should name the state: {msg}");
        assert!(msg.contains('7'), "message should name the id: {msg}");
    }

    #[test]
    fn invalid_priority_message_lists_accepted_labels() {
        let msg = Error::InvalidPriority("urgent".to_string()).to_string();
        assert!(msg.contains("urgent"));
        assert!(msg.contains("low, normal, or high"));
    }

    #[test]
    fn io_errors_convert_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
