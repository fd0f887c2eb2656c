//! Job store operations.
//!
//! Every method is a single short transaction. The conditional updates
//! ([`claim_pending`](Database::claim_pending),
//! [`reset_for_retry`](Database::reset_for_retry)) report success through
//! their affected-row count so two dispatchers can never both win a claim.

use crate::error::DatabaseError;
use crate::types::{DownloadId, Status};
use crate::{Error, Result};

use super::{Database, Download, ERROR_MESSAGE_MAX, NewDownload};

/// Columns selected for every `Download` row read
const DOWNLOAD_COLUMNS: &str = r#"
    id, document_id, source, source_id, url, file_path, file_name,
    status, priority, progress, downloaded_bytes, total_bytes, speed_bps,
    attempts, last_attempt, error_message,
    created_at, started_at, completed_at, updated_at
"#;

impl Database {
    /// Insert a new download job with status `pending`
    pub async fn insert_download(&self, download: &NewDownload) -> Result<DownloadId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                document_id, source, source_id, url, file_name,
                status, priority, progress, downloaded_bytes, attempts,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
            "#,
        )
        .bind(download.document_id)
        .bind(&download.source)
        .bind(&download.source_id)
        .bind(&download.url)
        .bind(&download.file_name)
        .bind(Status::Pending.to_i32())
        .bind(download.priority)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert download: {}",
                e
            )))
        })?;

        Ok(DownloadId(result.last_insert_rowid()))
    }

    /// Get a download job by ID
    pub async fn get_download(&self, id: DownloadId) -> Result<Option<Download>> {
        let row = sqlx::query_as::<_, Download>(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get download: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all download jobs, newest first
    pub async fn list_downloads(&self) -> Result<Vec<Download>> {
        let rows = sqlx::query_as::<_, Download>(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list downloads: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// List pending jobs in dispatch order: priority descending, then
    /// creation time ascending (FIFO within a priority band)
    pub async fn list_pending(&self) -> Result<Vec<Download>> {
        let rows = sqlx::query_as::<_, Download>(&format!(
            r#"
            SELECT {DOWNLOAD_COLUMNS} FROM downloads
            WHERE status = ?
            ORDER BY priority DESC, created_at ASC
            "#
        ))
        .bind(Status::Pending.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list pending downloads: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Atomically claim a pending job for dispatch
    ///
    /// Transitions `pending → downloading` and resets the per-attempt fields
    /// (progress, byte counter, error message, speed), stamps `started_at`
    /// and `last_attempt`, and increments `attempts` — all in one conditional
    /// write. Returns false if the job was no longer `pending`, in which case
    /// nothing was modified and the caller must abort without side effects.
    pub async fn claim_pending(&self, id: DownloadId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                progress = 0,
                downloaded_bytes = 0,
                total_bytes = NULL,
                speed_bps = NULL,
                error_message = NULL,
                started_at = ?,
                last_attempt = ?,
                attempts = attempts + 1,
                completed_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(Status::Downloading.to_i32())
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(Status::Pending.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim download: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the final file path — set once, at dispatch time, before any
    /// byte is transferred
    pub async fn set_file_path(&self, id: DownloadId, path: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE downloads SET file_path = ?, updated_at = ? WHERE id = ?")
            .bind(path)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set file path: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Write a throttled progress snapshot for an in-flight transfer
    pub async fn update_progress(
        &self,
        id: DownloadId,
        progress: i32,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        speed_bps: u64,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE downloads SET
                progress = ?,
                downloaded_bytes = ?,
                total_bytes = ?,
                speed_bps = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(progress.clamp(0, 99))
        .bind(downloaded_bytes as i64)
        .bind(total_bytes.map(|t| t as i64))
        .bind(speed_bps as i64)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update progress: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Finalize a successful transfer
    pub async fn mark_completed(
        &self,
        id: DownloadId,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                progress = 100,
                downloaded_bytes = ?,
                total_bytes = ?,
                speed_bps = NULL,
                error_message = NULL,
                completed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Status::Completed.to_i32())
        .bind(downloaded_bytes as i64)
        .bind(total_bytes.map(|t| t as i64))
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark download completed: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Finalize a failed transfer, truncating the message to the column limit
    pub async fn mark_failed(&self, id: DownloadId, message: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let message = truncate_error(message);

        sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                error_message = ?,
                speed_bps = NULL,
                completed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Status::Failed.to_i32())
        .bind(message)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark download failed: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Finalize a cancelled transfer
    pub async fn mark_cancelled(&self, id: DownloadId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                speed_bps = NULL,
                completed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Status::Cancelled.to_i32())
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark download cancelled: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Record an external cancellation request
    ///
    /// Unconditional: a pending job is simply never dispatched afterwards; a
    /// running worker observes the status and unwinds at the next chunk
    /// boundary.
    pub async fn request_cancel(&self, id: DownloadId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE downloads SET status = ?, error_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Status::Cancelled.to_i32())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to request cancel: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Whether an external cancellation has been recorded for this job
    pub async fn cancel_requested(&self, id: DownloadId) -> Result<bool> {
        let status: Option<i32> = sqlx::query_scalar("SELECT status FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to read download status: {}",
                    e
                )))
            })?;

        Ok(status.map(Status::from_i32) == Some(Status::Cancelled))
    }

    /// Reset a failed or cancelled job back to `pending` for a fresh attempt
    ///
    /// Clears progress, byte counters, total size, speed, and error message.
    /// Conditional on the current status; returns false (nothing modified)
    /// for any other state.
    pub async fn reset_for_retry(&self, id: DownloadId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                progress = 0,
                downloaded_bytes = 0,
                total_bytes = NULL,
                speed_bps = NULL,
                error_message = NULL,
                updated_at = ?
            WHERE id = ? AND status IN (?, ?)
            "#,
        )
        .bind(Status::Pending.to_i32())
        .bind(now)
        .bind(id)
        .bind(Status::Failed.to_i32())
        .bind(Status::Cancelled.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to reset download for retry: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() == 1)
    }
}

/// Truncate an error message to [`ERROR_MESSAGE_MAX`] bytes on a char boundary
fn truncate_error(message: &str) -> &str {
    if message.len() <= ERROR_MESSAGE_MAX {
        return message;
    }
    let mut end = ERROR_MESSAGE_MAX;
    while end > 0 && !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
