//! Worker: executes one download job from claim to terminal state.
//!
//! A worker claims its job in the store, streams the response body to a
//! `.part` file next to the final target, and finalizes by renaming on
//! success or removing the partial file otherwise. Cancellation is observed
//! at chunk boundaries, via the token for fast in-process cancels and via
//! the store flag on the progress tick for cancels that raced dispatch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::catalog::DocumentCatalog;
use crate::config::Config;
use crate::db::{Database, Download};
use crate::error::DownloadError;
use crate::paths::{build_target_path, part_path};
use crate::types::{DownloadId, Event};

/// Minimum interval between progress persistence and events
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Unknown-length transfers advance 1% per this many bytes (capped at 99)
const UNKNOWN_LENGTH_STEP: u64 = 1024 * 1024;

/// Everything a worker task needs, captured at dispatch time
pub(super) struct WorkerContext {
    pub(super) id: DownloadId,
    pub(super) db: Arc<Database>,
    pub(super) config: Arc<Config>,
    pub(super) catalog: Arc<dyn DocumentCatalog>,
    pub(super) http: reqwest::Client,
    pub(super) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(super) cancel: CancellationToken,
}

impl WorkerContext {
    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Byte counters of a finished transfer
struct TransferStats {
    downloaded: u64,
    total: Option<u64>,
}

/// Why a transfer did not finish
enum TransferAbort {
    Cancelled,
    Failed(String),
}

/// Worker entry point. Never returns an error: every outcome is persisted
/// to the store and reported through events.
pub(super) async fn run(ctx: WorkerContext) {
    let id = ctx.id;

    // Atomic claim: exactly one dispatcher wins a pending job
    match ctx.db.claim_pending(id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(download_id = id.0, "Job no longer pending - skipping");
            return;
        }
        Err(e) => {
            tracing::error!(download_id = id.0, error = %e, "Failed to claim download");
            return;
        }
    }

    // Re-read after the claim so attempts and timestamps are current
    let job = match ctx.db.get_download(id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!(download_id = id.0, "Claimed job vanished from the store");
            return;
        }
        Err(e) => {
            tracing::error!(download_id = id.0, error = %e, "Failed to load claimed download");
            return;
        }
    };

    let target = build_target_path(
        &ctx.config.paths.library_dir,
        &job.source,
        id,
        job.file_name.as_deref(),
        &job.url,
    );
    let tmp = part_path(&target);

    if let Err(e) = prepare_target(&ctx, &target).await {
        finalize_failure(&ctx, &job, &tmp, e).await;
        return;
    }

    tracing::info!(download_id = id.0, url = %job.url, target = %target.display(), "Download started");

    match transfer(&ctx, &job.url, &tmp).await {
        Ok(stats) => finalize_success(&ctx, &job, &tmp, &target, stats).await,
        Err(TransferAbort::Cancelled) => finalize_cancelled(&ctx, &job, &tmp).await,
        Err(TransferAbort::Failed(reason)) => finalize_failure(&ctx, &job, &tmp, reason).await,
    }
}

/// Persist the target path and make sure its directory exists
async fn prepare_target(ctx: &WorkerContext, target: &Path) -> Result<(), String> {
    if let Err(e) = ctx
        .db
        .set_file_path(ctx.id, &target.to_string_lossy())
        .await
    {
        return Err(format!("Failed to persist target path: {e}"));
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return Err(format!(
                "Failed to create directory '{}': {}",
                parent.display(),
                e
            ));
        }
    }
    Ok(())
}

/// Stream the response body to the partial file, observing cancellation at
/// chunk boundaries and persisting throttled progress snapshots.
async fn transfer(
    ctx: &WorkerContext,
    url: &str,
    tmp: &Path,
) -> Result<TransferStats, TransferAbort> {
    // Cancellation also covers the wait for response headers
    let response = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(TransferAbort::Cancelled),
        response = ctx.http.get(url).send() => {
            response.map_err(|e| TransferAbort::Failed(format!("Request failed: {e}")))?
        }
    };

    let status = response.status();
    if !status.is_success() {
        let err = DownloadError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        };
        return Err(TransferAbort::Failed(err.to_string()));
    }

    let total = response.content_length();
    let mut file = tokio::fs::File::create(tmp)
        .await
        .map_err(|e| TransferAbort::Failed(format!("Failed to create partial file: {e}")))?;

    let stream = response.bytes_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(stream);
    let mut buf = vec![0u8; ctx.config.download.chunk_size.max(1)];

    let mut downloaded: u64 = 0;
    let started = tokio::time::Instant::now();
    let mut last_snapshot = started;

    loop {
        let read = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(TransferAbort::Cancelled),
            read = reader.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(TransferAbort::Failed(format!("Transfer failed: {e}"))),
        };

        file.write_all(&buf[..n])
            .await
            .map_err(|e| TransferAbort::Failed(format!("Failed to write partial file: {e}")))?;
        downloaded += n as u64;

        if last_snapshot.elapsed() >= PROGRESS_INTERVAL {
            // Store-side cancel flag catches requests that raced the token
            match ctx.db.cancel_requested(ctx.id).await {
                Ok(true) => return Err(TransferAbort::Cancelled),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(download_id = ctx.id.0, error = %e, "Cancel check failed")
                }
            }

            let elapsed = started.elapsed().as_secs_f64();
            let speed_bps = if elapsed > 0.0 {
                (downloaded as f64 / elapsed) as u64
            } else {
                0
            };
            let progress = progress_percent(downloaded, total);

            if let Err(e) = ctx
                .db
                .update_progress(ctx.id, progress, downloaded, total, speed_bps)
                .await
            {
                tracing::warn!(download_id = ctx.id.0, error = %e, "Failed to persist progress");
            }
            ctx.emit(Event::Progress {
                id: ctx.id,
                progress,
                downloaded_bytes: downloaded,
                total_bytes: total,
                speed_bps,
            });
            last_snapshot = tokio::time::Instant::now();
        }
    }

    file.flush()
        .await
        .map_err(|e| TransferAbort::Failed(format!("Failed to flush partial file: {e}")))?;

    Ok(TransferStats { downloaded, total })
}

/// Percentage for an in-flight snapshot, never reaching 100.
///
/// With a known length this is plain byte proportion capped at 99. Without
/// one the bar still moves: 1% per megabyte received, capped at 99.
fn progress_percent(downloaded: u64, total: Option<u64>) -> i32 {
    let pct = match total {
        Some(total) if total > 0 => downloaded.saturating_mul(100) / total,
        _ => downloaded / UNKNOWN_LENGTH_STEP,
    };
    pct.min(99) as i32
}

async fn finalize_success(
    ctx: &WorkerContext,
    job: &Download,
    tmp: &Path,
    target: &Path,
    stats: TransferStats,
) {
    if let Err(e) = tokio::fs::rename(tmp, target).await {
        let reason = DownloadError::Finalize {
            path: target.to_path_buf(),
            reason: e.to_string(),
        }
        .to_string();
        finalize_failure(ctx, job, tmp, reason).await;
        return;
    }

    if let Err(e) = ctx
        .db
        .mark_completed(ctx.id, stats.downloaded, stats.total)
        .await
    {
        tracing::error!(download_id = ctx.id.0, error = %e, "Failed to record completion");
    }

    if let Some(document_id) = job.document_id {
        if let Err(e) = ctx
            .catalog
            .mark_downloaded(document_id, target, stats.downloaded)
            .await
        {
            // Catalog trouble never changes the job's own outcome
            tracing::warn!(download_id = ctx.id.0, document_id, error = %e, "Catalog update failed");
        }
    }

    tracing::info!(
        download_id = ctx.id.0,
        size_bytes = stats.downloaded,
        path = %target.display(),
        "Download completed"
    );
    ctx.emit(Event::Completed {
        id: ctx.id,
        path: target.to_path_buf(),
        size_bytes: stats.downloaded,
    });
}

async fn finalize_cancelled(ctx: &WorkerContext, _job: &Download, tmp: &Path) {
    remove_partial(tmp).await;

    if let Err(e) = ctx.db.mark_cancelled(ctx.id).await {
        tracing::error!(download_id = ctx.id.0, error = %e, "Failed to record cancellation");
    }

    tracing::info!(download_id = ctx.id.0, "Download cancelled");
    ctx.emit(Event::Cancelled { id: ctx.id });
}

async fn finalize_failure(ctx: &WorkerContext, job: &Download, tmp: &Path, reason: String) {
    remove_partial(tmp).await;

    if let Err(e) = ctx.db.mark_failed(ctx.id, &reason).await {
        tracing::error!(download_id = ctx.id.0, error = %e, "Failed to record failure");
    }

    if let Some(document_id) = job.document_id {
        if let Err(e) = ctx
            .catalog
            .mark_failed(document_id, &reason, job.attempts, chrono::Utc::now())
            .await
        {
            tracing::warn!(download_id = ctx.id.0, document_id, error = %e, "Catalog update failed");
        }
    }

    tracing::warn!(download_id = ctx.id.0, error = %reason, "Download failed");
    ctx.emit(Event::Failed {
        id: ctx.id,
        error: reason,
    });
}

/// Best-effort removal of a partial file; missing files are fine
async fn remove_partial(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove partial file");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod progress_tests {
    use super::progress_percent;

    #[test]
    fn known_length_is_proportional() {
        assert_eq!(progress_percent(0, Some(1000)), 0);
        assert_eq!(progress_percent(500, Some(1000)), 50);
        assert_eq!(progress_percent(999, Some(1000)), 99);
    }

    #[test]
    fn snapshot_never_reports_one_hundred() {
        assert_eq!(progress_percent(1000, Some(1000)), 99);
        assert_eq!(progress_percent(5000, Some(1000)), 99);
    }

    #[test]
    fn unknown_length_advances_per_megabyte() {
        assert_eq!(progress_percent(0, None), 0);
        assert_eq!(progress_percent(3 * 1024 * 1024, None), 3);
        assert_eq!(progress_percent(500 * 1024 * 1024, None), 99);
        assert_eq!(progress_percent(1024, Some(0)), 0);
    }
}
