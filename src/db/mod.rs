//! Database layer for doclib-dl
//!
//! Handles SQLite persistence for the download job store — the single source
//! of truth for every job's state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`downloads`] — Job store operations (insert, claim, progress, finalize)
//!
//! All operations are short, independent transactions; no transaction is
//! ever held open across network or disk I/O.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

use crate::types::{Priority, Status, timestamp_to_datetime};

mod downloads;
mod migrations;

/// Maximum persisted length of a job's error message, in bytes
pub const ERROR_MESSAGE_MAX: usize = 512;

/// New download job to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewDownload {
    /// Weak reference to a catalog entry (identifier only, no ownership)
    pub document_id: Option<i64>,
    /// Source identifier (e.g. "awmf", "who", "manual")
    pub source: String,
    /// Identifier of the item at its source
    pub source_id: String,
    /// URL to fetch
    pub url: String,
    /// Requested filename (None falls back to the URL's last path segment)
    pub file_name: Option<String>,
    /// Download priority code (see [`Priority`])
    pub priority: i32,
}

/// Download job record from database
#[derive(Debug, Clone, FromRow)]
pub struct Download {
    /// Unique database ID
    pub id: i64,
    /// Weak reference to a catalog entry
    pub document_id: Option<i64>,
    /// Source identifier
    pub source: String,
    /// Identifier of the item at its source
    pub source_id: String,
    /// URL to fetch
    pub url: String,
    /// Final file path — assigned exactly once, at dispatch time
    pub file_path: Option<String>,
    /// Requested filename
    pub file_name: Option<String>,
    /// Current status code (see [`Status`])
    pub status: i32,
    /// Priority code (see [`Priority`])
    pub priority: i32,
    /// Progress percentage (0–100)
    pub progress: i32,
    /// Bytes transferred so far
    pub downloaded_bytes: i64,
    /// Total size in bytes, if the server reported one
    pub total_bytes: Option<i64>,
    /// Transfer speed in bytes per second (transient — cleared on any
    /// terminal state)
    pub speed_bps: Option<i64>,
    /// Number of dispatches so far
    pub attempts: i64,
    /// Unix timestamp of the most recent dispatch
    pub last_attempt: Option<i64>,
    /// Error message from the most recent failed attempt
    pub error_message: Option<String>,
    /// Unix timestamp when the job was created
    pub created_at: i64,
    /// Unix timestamp when the most recent transfer started
    pub started_at: Option<i64>,
    /// Unix timestamp when the job reached a terminal state
    pub completed_at: Option<i64>,
    /// Unix timestamp of the last store write for this row
    pub updated_at: Option<i64>,
}

impl Download {
    /// Decoded status
    pub fn status(&self) -> Status {
        Status::from_i32(self.status)
    }

    /// Decoded priority
    pub fn priority(&self) -> Priority {
        Priority::from_i32(self.priority)
    }

    /// Creation time as `DateTime<Utc>`
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        timestamp_to_datetime(self.created_at)
    }

    /// Start of the most recent transfer, if any
    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        self.started_at.map(timestamp_to_datetime)
    }

    /// Time the job reached a terminal state, if it has
    pub fn completed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.completed_at.map(timestamp_to_datetime)
    }

    /// Most recent dispatch time, if the job was ever dispatched
    pub fn last_attempt_utc(&self) -> Option<DateTime<Utc>> {
        self.last_attempt.map(timestamp_to_datetime)
    }
}

/// Database handle for doclib-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
