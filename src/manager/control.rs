//! External control operations: enqueue, cancel, retry, get, list, wakeup.
//!
//! These are the methods a host application (HTTP layer, CLI, other
//! services) calls. All of them go through the job store; none of them block
//! on transfers.

use super::DownloadManager;
use crate::db::{Download, NewDownload};
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadId, Event, NewDownloadRequest};

impl DownloadManager {
    /// Enqueue a new download and wake the scheduler.
    ///
    /// The job is persisted as Pending and picked up by the next scheduler
    /// pass; returns the freshly created row. The URL must parse and use an
    /// http(s) scheme.
    pub async fn enqueue(&self, request: NewDownloadRequest) -> Result<Download> {
        validate_url(&request.url)?;

        let new_download = NewDownload {
            document_id: request.document_id,
            source: request.source,
            source_id: request.source_id,
            url: request.url,
            file_name: request.file_name,
            priority: request.priority as i32,
        };

        let id = self.db.insert_download(&new_download).await?;
        let download = self.require(id).await?;

        tracing::info!(
            download_id = id.0,
            source = %download.source,
            source_id = %download.source_id,
            priority = download.priority,
            "Download queued"
        );
        self.emit_event(Event::Queued {
            id,
            source: download.source.clone(),
        });
        self.wakeup();

        Ok(download)
    }

    /// Request cancellation of a download.
    ///
    /// Pending jobs move to Cancelled before they ever run; active jobs have
    /// their token cancelled and stop at the next chunk boundary. Terminal
    /// jobs are re-marked Cancelled (the operation is unconditional).
    /// Returns the updated row.
    pub async fn cancel(&self, id: DownloadId) -> Result<Download> {
        // Existence check first so unknown ids surface as NotFound
        self.require(id).await?;

        if let Some(entry) = self.scheduler.active.lock().await.get(&id) {
            tracing::debug!(download_id = id.0, "Signalling active worker to stop");
            entry.cancel.cancel();
        }

        self.db.request_cancel(id).await?;
        tracing::info!(download_id = id.0, "Download cancel requested");
        self.wakeup();

        self.require(id).await
    }

    /// Re-queue a failed or cancelled download.
    ///
    /// Resets progress counters and the error message and moves the job back
    /// to Pending; any other state is rejected with `InvalidState`. Returns
    /// the updated row.
    pub async fn retry(&self, id: DownloadId) -> Result<Download> {
        let download = self.require(id).await?;

        if !self.db.reset_for_retry(id).await? {
            return Err(Error::Download(DownloadError::InvalidState {
                id: id.0,
                operation: "retry".to_string(),
                current_state: download.status().to_string(),
            }));
        }

        tracing::info!(download_id = id.0, "Download re-queued for retry");
        self.wakeup();

        self.require(id).await
    }

    /// Fetch a single download by id
    pub async fn get(&self, id: DownloadId) -> Result<Download> {
        self.require(id).await
    }

    /// List all downloads, newest first
    pub async fn list(&self) -> Result<Vec<Download>> {
        self.db.list_downloads().await
    }

    /// Nudge the scheduler to run a pass now instead of waiting out its
    /// poll interval. Cheap and safe to call at any time.
    pub fn wakeup(&self) {
        self.scheduler.wakeup.notify_one();
    }

    async fn require(&self, id: DownloadId) -> Result<Download> {
        self.db
            .get_download(id)
            .await?
            .ok_or(Error::Download(DownloadError::NotFound { id: id.0 }))
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| {
        Error::Download(DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Download(DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        })),
    }
}
