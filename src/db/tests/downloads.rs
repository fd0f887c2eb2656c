use super::{sample_download, test_db};
use crate::db::{ERROR_MESSAGE_MAX, NewDownload};
use crate::types::{DownloadId, Priority, Status};

#[tokio::test]
async fn insert_and_get_download() {
    let (db, _file) = test_db().await;

    let new_download = NewDownload {
        document_id: Some(9),
        source: "awmf".to_string(),
        source_id: "021-007".to_string(),
        url: "https://example.com/guideline.pdf".to_string(),
        file_name: Some("guideline.pdf".to_string()),
        priority: Priority::High as i32,
    };

    let id = db.insert_download(&new_download).await.unwrap();
    assert!(id.0 > 0);

    let download = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(download.source, "awmf");
    assert_eq!(download.source_id, "021-007");
    assert_eq!(download.document_id, Some(9));
    assert_eq!(download.status(), Status::Pending);
    assert_eq!(download.priority(), Priority::High);
    assert_eq!(download.progress, 0);
    assert_eq!(download.downloaded_bytes, 0);
    assert_eq!(download.attempts, 0);
    assert!(download.file_path.is_none());
    assert!(download.started_at.is_none());
    assert!(download.created_at > 0);

    db.close().await;
}

#[tokio::test]
async fn get_missing_download_returns_none() {
    let (db, _file) = test_db().await;
    assert!(db.get_download(DownloadId(404)).await.unwrap().is_none());
    db.close().await;
}

#[tokio::test]
async fn list_downloads_is_newest_first() {
    let (db, _file) = test_db().await;

    let first = db.insert_download(&sample_download("a", 1)).await.unwrap();
    let second = db.insert_download(&sample_download("b", 1)).await.unwrap();
    let third = db.insert_download(&sample_download("c", 1)).await.unwrap();

    let downloads = db.list_downloads().await.unwrap();
    assert_eq!(downloads.len(), 3);
    // Inserted within the same second the timestamps tie; ids must still all appear
    let ids: Vec<i64> = downloads.iter().map(|d| d.id).collect();
    assert!(ids.contains(&first.0) && ids.contains(&second.0) && ids.contains(&third.0));

    db.close().await;
}

#[tokio::test]
async fn list_pending_orders_by_priority_then_age() {
    let (db, _file) = test_db().await;

    let low = db
        .insert_download(&sample_download("s", Priority::Low as i32))
        .await
        .unwrap();
    let normal = db
        .insert_download(&sample_download("s", Priority::Normal as i32))
        .await
        .unwrap();
    let high = db
        .insert_download(&sample_download("s", Priority::High as i32))
        .await
        .unwrap();

    let pending = db.list_pending().await.unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].id, high.0, "high priority dispatches first");
    assert_eq!(pending[1].id, normal.0);
    assert_eq!(pending[2].id, low.0);

    db.close().await;
}

#[tokio::test]
async fn list_pending_excludes_terminal_and_downloading_jobs() {
    let (db, _file) = test_db().await;

    let claimed = db.insert_download(&sample_download("s", 1)).await.unwrap();
    let cancelled = db.insert_download(&sample_download("s", 1)).await.unwrap();
    let waiting = db.insert_download(&sample_download("s", 1)).await.unwrap();

    assert!(db.claim_pending(claimed).await.unwrap());
    db.request_cancel(cancelled).await.unwrap();

    let pending = db.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, waiting.0);

    db.close().await;
}

#[tokio::test]
async fn claim_pending_resets_attempt_fields() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    // Leave residue from a previous failed attempt
    db.claim_pending(id).await.unwrap();
    db.mark_failed(id, "boom").await.unwrap();
    db.reset_for_retry(id).await.unwrap();

    assert!(db.claim_pending(id).await.unwrap());

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Downloading);
    assert_eq!(d.progress, 0);
    assert_eq!(d.downloaded_bytes, 0);
    assert_eq!(d.attempts, 2, "each dispatch increments attempts");
    assert!(d.error_message.is_none());
    assert!(d.started_at.is_some());
    assert!(d.last_attempt.is_some());
    assert!(d.completed_at.is_none());

    db.close().await;
}

#[tokio::test]
async fn claim_pending_fails_for_second_claimant() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    assert!(db.claim_pending(id).await.unwrap());
    assert!(
        !db.claim_pending(id).await.unwrap(),
        "a job can only be claimed while pending"
    );

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.attempts, 1, "the losing claim must not increment attempts");

    db.close().await;
}

#[tokio::test]
async fn claim_pending_fails_for_cancelled_job() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.request_cancel(id).await.unwrap();

    assert!(!db.claim_pending(id).await.unwrap());
    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Cancelled);

    db.close().await;
}

#[tokio::test]
async fn update_progress_caps_below_one_hundred() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(id).await.unwrap();
    db.update_progress(id, 150, 5000, Some(10_000), 2048)
        .await
        .unwrap();

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(
        d.progress, 99,
        "an in-flight snapshot must never signal completion"
    );
    assert_eq!(d.downloaded_bytes, 5000);
    assert_eq!(d.total_bytes, Some(10_000));
    assert_eq!(d.speed_bps, Some(2048));

    db.close().await;
}

#[tokio::test]
async fn mark_completed_sets_terminal_fields() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(id).await.unwrap();
    db.update_progress(id, 50, 5000, Some(10_000), 2048)
        .await
        .unwrap();
    db.mark_completed(id, 10_000, Some(10_000)).await.unwrap();

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Completed);
    assert_eq!(d.progress, 100);
    assert_eq!(d.downloaded_bytes, 10_000);
    assert_eq!(d.total_bytes, Some(10_000));
    assert!(d.speed_bps.is_none(), "speed is transient and cleared");
    assert!(d.error_message.is_none());
    assert!(d.completed_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn mark_failed_truncates_long_messages() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(id).await.unwrap();
    db.mark_failed(id, &"e".repeat(4096)).await.unwrap();

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Failed);
    let msg = d.error_message.unwrap();
    assert_eq!(msg.len(), ERROR_MESSAGE_MAX);
    assert!(d.speed_bps.is_none());
    assert!(d.completed_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn mark_cancelled_clears_speed_and_stamps_completion() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(id).await.unwrap();
    db.update_progress(id, 10, 1000, None, 512).await.unwrap();
    db.mark_cancelled(id).await.unwrap();

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Cancelled);
    assert!(d.speed_bps.is_none());
    assert!(d.completed_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn cancel_requested_reads_back_the_flag() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    assert!(!db.cancel_requested(id).await.unwrap());

    db.request_cancel(id).await.unwrap();
    assert!(db.cancel_requested(id).await.unwrap());

    // Unknown ids are simply not cancelled
    assert!(!db.cancel_requested(DownloadId(404)).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn reset_for_retry_restores_pending_from_failed() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(id).await.unwrap();
    db.update_progress(id, 40, 4000, Some(10_000), 1000)
        .await
        .unwrap();
    db.mark_failed(id, "network unreachable").await.unwrap();

    assert!(db.reset_for_retry(id).await.unwrap());

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.status(), Status::Pending);
    assert_eq!(d.progress, 0);
    assert_eq!(d.downloaded_bytes, 0);
    assert!(d.total_bytes.is_none());
    assert!(d.speed_bps.is_none());
    assert!(d.error_message.is_none());
    assert_eq!(d.attempts, 1, "retry does not rewrite attempt history");

    db.close().await;
}

#[tokio::test]
async fn reset_for_retry_rejects_completed_and_active_jobs() {
    let (db, _file) = test_db().await;

    let completed = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(completed).await.unwrap();
    db.mark_completed(completed, 100, Some(100)).await.unwrap();
    assert!(!db.reset_for_retry(completed).await.unwrap());

    let downloading = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.claim_pending(downloading).await.unwrap();
    assert!(!db.reset_for_retry(downloading).await.unwrap());

    let pending = db.insert_download(&sample_download("s", 1)).await.unwrap();
    assert!(!db.reset_for_retry(pending).await.unwrap());

    db.close().await;
}

#[tokio::test]
async fn set_file_path_persists_target() {
    let (db, _file) = test_db().await;

    let id = db.insert_download(&sample_download("s", 1)).await.unwrap();
    db.set_file_path(id, "/library/s/1-report.pdf").await.unwrap();

    let d = db.get_download(id).await.unwrap().unwrap();
    assert_eq!(d.file_path.as_deref(), Some("/library/s/1-report.pdf"));

    db.close().await;
}
