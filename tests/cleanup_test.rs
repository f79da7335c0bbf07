use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use offline_voice_sync::lifecycle;
use offline_voice_sync::maintenance::{
    cleanup_with_params, cleanup_with_retention, delete_one, stats, QueueStats,
};
use offline_voice_sync::recording::{Recording, RecordingMetadata, RecordingStatus};
use offline_voice_sync::store::RecordingStore;

fn payload(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

async fn enqueue(store: &RecordingStore, user_id: &str, bytes: &[u8]) -> Recording {
    lifecycle::enqueue(store, user_id, &payload(bytes), RecordingMetadata::default())
        .await
        .unwrap()
}

/// Helper to drive a recording to processed with processed_at a given number
/// of days before the reference time
async fn insert_processed_days_ago(
    store: &RecordingStore,
    user_id: &str,
    bytes: &[u8],
    reference_time: DateTime<Utc>,
    days_ago: i64,
) -> Recording {
    let rec = enqueue(store, user_id, bytes).await;
    lifecycle::mark_processing(store, rec.id).await.unwrap();
    let mut rec = lifecycle::complete_success(store, rec.id, json!({}), 1.0)
        .await
        .unwrap();
    rec.processed_at = Some(reference_time - Duration::try_days(days_ago).unwrap());
    store.replace(&rec).await.unwrap();
    rec
}

/// Helper to drive a recording into the failed state
async fn insert_failed(store: &RecordingStore, user_id: &str, bytes: &[u8]) -> Recording {
    let rec = enqueue(store, user_id, bytes).await;
    let mut last = rec.clone();
    while last.status != RecordingStatus::Failed {
        lifecycle::mark_processing(store, rec.id).await.unwrap();
        last = lifecycle::complete_failure(store, rec.id, "service down")
            .await
            .unwrap();
    }
    last
}

#[tokio::test]
async fn test_cleanup_deletes_only_past_retention_boundary() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();

    let old = insert_processed_days_ago(&store, "u1", b"old", reference, 8).await;
    let recent = insert_processed_days_ago(&store, "u1", b"recent", reference, 6).await;

    let deleted = cleanup_with_params(&store, 7, Some(reference)).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get(old.id).await.unwrap().is_none());
    assert!(store.get(recent.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_never_touches_non_processed_records() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();
    let ancient = reference - Duration::try_days(365).unwrap();

    // Pending and failed records a year old, plus one stuck in processing
    let mut pending = enqueue(&store, "u1", b"pending").await;
    pending.created_at = ancient;
    store.replace(&pending).await.unwrap();

    let failed = insert_failed(&store, "u1", b"failed").await;
    let mut failed_rec = store.get(failed.id).await.unwrap().unwrap();
    failed_rec.created_at = ancient;
    failed_rec.last_attempt = Some(ancient);
    store.replace(&failed_rec).await.unwrap();

    let processing = enqueue(&store, "u1", b"stuck").await;
    let mut processing_rec = lifecycle::mark_processing(&store, processing.id).await.unwrap();
    processing_rec.processing_at = Some(ancient);
    store.replace(&processing_rec).await.unwrap();

    let deleted = cleanup_with_params(&store, 7, Some(reference)).await.unwrap();
    assert_eq!(deleted, 0);
    assert!(store.get(pending.id).await.unwrap().is_some());
    assert!(store.get(failed.id).await.unwrap().is_some());
    assert!(store.get(processing.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_with_empty_store() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let deleted = cleanup_with_retention(&store, 7).await.unwrap();
    assert_eq!(deleted, 0);
}

#[tokio::test]
async fn test_cleanup_counts_multiple_deletions() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();

    insert_processed_days_ago(&store, "u1", b"a", reference, 10).await;
    insert_processed_days_ago(&store, "u1", b"b", reference, 20).await;
    insert_processed_days_ago(&store, "u2", b"c", reference, 30).await;
    let kept = insert_processed_days_ago(&store, "u1", b"d", reference, 1).await;

    let deleted = cleanup_with_params(&store, 7, Some(reference)).await.unwrap();
    assert_eq!(deleted, 3);

    let remaining = store.get_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.id);
}

#[tokio::test]
async fn test_cleanup_rejects_nonpositive_retention() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    // i64::MIN cannot be represented as a Duration
    assert!(cleanup_with_retention(&store, i64::MIN).await.is_err());
}

#[tokio::test]
async fn test_stats_counts_per_status() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();

    enqueue(&store, "u1", b"p1").await;
    enqueue(&store, "u1", b"p2").await;
    insert_processed_days_ago(&store, "u1", b"done", reference, 1).await;
    insert_failed(&store, "u1", b"bad").await;
    let stuck = enqueue(&store, "u1", b"stuck").await;
    lifecycle::mark_processing(&store, stuck.id).await.unwrap();

    let s = stats(&store, Some("u1")).await.unwrap();
    assert_eq!(
        s,
        QueueStats {
            total: 5,
            pending: 2,
            processing: 1,
            processed: 1,
            failed: 1
        }
    );
}

#[tokio::test]
async fn test_stats_scopes_to_user_or_global() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    enqueue(&store, "u1", b"a").await;
    enqueue(&store, "u2", b"b").await;
    enqueue(&store, "u2", b"c").await;

    let u1 = stats(&store, Some("u1")).await.unwrap();
    assert_eq!(u1.total, 1);
    let u2 = stats(&store, Some("u2")).await.unwrap();
    assert_eq!(u2.total, 2);
    let global = stats(&store, None).await.unwrap();
    assert_eq!(global.total, 3);
    assert_eq!(global.pending, 3);

    let nobody = stats(&store, Some("u3")).await.unwrap();
    assert_eq!(nobody, QueueStats::default());
}

#[tokio::test]
async fn test_failed_records_stay_visible_until_user_acts() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();

    let failed = insert_failed(&store, "u1", b"bad").await;
    cleanup_with_params(&store, 7, Some(reference)).await.unwrap();

    let s = stats(&store, Some("u1")).await.unwrap();
    assert_eq!(s.failed, 1);

    // Explicit deletion is the only way a failed record leaves the queue
    delete_one(&store, failed.id).await.unwrap();
    let s = stats(&store, Some("u1")).await.unwrap();
    assert_eq!(s.failed, 0);
}

#[tokio::test]
async fn test_delete_one_removes_any_status() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let reference = Utc::now();

    let pending = enqueue(&store, "u1", b"pending").await;
    let processed = insert_processed_days_ago(&store, "u1", b"done", reference, 1).await;
    let failed = insert_failed(&store, "u1", b"bad").await;

    delete_one(&store, pending.id).await.unwrap();
    delete_one(&store, processed.id).await.unwrap();
    delete_one(&store, failed.id).await.unwrap();
    assert!(store.get_all().await.unwrap().is_empty());

    // Idempotent: deleting again is a no-op
    delete_one(&store, pending.id).await.unwrap();
}
