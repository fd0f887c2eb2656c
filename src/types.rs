//! Core types for doclib-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub i64);

impl DownloadId {
    /// Create a new DownloadId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DownloadId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DownloadId> for i64 {
    fn from(id: DownloadId) -> Self {
        id.0
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DownloadId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for DownloadId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DownloadId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DownloadId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Download job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting to be dispatched by the scheduler
    Pending,
    /// Currently transferring
    Downloading,
    /// Successfully completed (terminal)
    Completed,
    /// Failed with an error (terminal until retried)
    Failed,
    /// Reserved — no code path in this crate sets or reads it
    Paused,
    /// Cancelled by an external request (terminal until retried)
    Cancelled,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Pending,
            1 => Status::Downloading,
            2 => Status::Completed,
            3 => Status::Failed,
            4 => Status::Paused,
            5 => Status::Cancelled,
            _ => Status::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Pending => 0,
            Status::Downloading => 1,
            Status::Completed => 2,
            Status::Failed => 3,
            Status::Paused => 4,
            Status::Cancelled => 5,
        }
    }

    /// Whether this status is terminal (never picked up by the scheduler)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Downloading => "downloading",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Paused => "paused",
            Status::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Download priority band
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority (0)
    Low = 0,
    /// Normal priority (1)
    #[default]
    Normal = 1,
    /// High priority (2)
    High = 2,
}

impl Priority {
    /// Convert integer priority code to Priority enum
    pub fn from_i32(priority: i32) -> Self {
        match priority {
            0 => Priority::Low,
            1 => Priority::Normal,
            2 => Priority::High,
            _ => Priority::Normal, // Default to Normal for unknown priority
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::Error;

    /// Parse a priority label. Accepts exactly `low`, `normal`, or `high`;
    /// anything else is a validation error rejected to the caller.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(crate::error::Error::InvalidPriority(other.to_string())),
        }
    }
}

/// Event emitted during the download lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job added to the queue
    Queued {
        /// Download ID
        id: DownloadId,
        /// Source identifier
        source: String,
    },

    /// Transfer progress update
    Progress {
        /// Download ID
        id: DownloadId,
        /// Progress percentage (0–100)
        progress: i32,
        /// Bytes transferred so far
        downloaded_bytes: u64,
        /// Total size, if the server reported one
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
        /// Current transfer speed in bytes per second
        speed_bps: u64,
    },

    /// Transfer finished and the file is at its final path
    Completed {
        /// Download ID
        id: DownloadId,
        /// Final path
        path: PathBuf,
        /// Final size in bytes
        size_bytes: u64,
    },

    /// Transfer failed
    Failed {
        /// Download ID
        id: DownloadId,
        /// Error message (truncated to the store limit)
        error: String,
    },

    /// Transfer cancelled by an external request
    Cancelled {
        /// Download ID
        id: DownloadId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// Request for a new download job (the enqueue operation input)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDownloadRequest {
    /// URL to fetch
    pub url: String,
    /// Source identifier (e.g. "awmf", "who", "manual")
    pub source: String,
    /// Identifier of the item at its source
    pub source_id: String,
    /// Optional weak reference to a catalog entry
    #[serde(default)]
    pub document_id: Option<i64>,
    /// Requested filename (falls back to the URL's last path segment)
    #[serde(default)]
    pub file_name: Option<String>,
    /// Priority band
    #[serde(default)]
    pub priority: Priority,
}

/// Decode a Unix timestamp column into `DateTime<Utc>`
pub(crate) fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}
