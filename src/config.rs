//! Configuration types for doclib-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem layout configuration
///
/// Groups the directories and database location the subsystem writes to.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathConfig {
    /// Library root — completed files land under one subdirectory per source
    /// (default: "./library")
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// SQLite database path (default: "./data/doclib.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            database_path: default_database_path(),
        }
    }
}

/// Download behavior configuration (concurrency, chunking, timeouts)
///
/// Used as a nested sub-config within [`Config`]. Read once at manager start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrently executing workers (default: 3)
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Transfer chunk size in bytes — the granularity at which cancellation
    /// is observed (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-request network timeout enforced by the HTTP transport
    /// (default: 300 s). There is no overall per-job deadline.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// Retry policy fields carried for embedders. This core only performs
    /// manual retry; these values are not consumed here.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            chunk_size: default_chunk_size(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy configuration (reserved for embedder-driven retry)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts (default: 3)
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay between retries (default: 5 s)
    #[serde(default = "default_retry_delay", with = "duration_secs")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Main configuration for [`DownloadManager`](crate::manager::DownloadManager)
///
/// Fields are organized into logical sub-configs:
/// - [`paths`](PathConfig) — library root and database location
/// - [`download`](DownloadConfig) — concurrency, chunking, timeouts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem layout
    #[serde(default)]
    pub paths: PathConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("./library")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/doclib.db")
}

fn default_max_parallel() -> usize {
    3
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

/// Serialize/deserialize `Duration` as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
