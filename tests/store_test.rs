use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use offline_voice_sync::db;
use offline_voice_sync::error::QueueError;
use offline_voice_sync::recording::{
    ClassificationType, Recording, RecordingMetadata, RecordingStatus,
};
use offline_voice_sync::store::RecordingStore;
use offline_voice_sync::EXPECTED_DB_VERSION;

fn payload(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

async fn insert_recording(store: &RecordingStore, user_id: &str, bytes: &[u8]) -> Recording {
    store
        .insert(user_id, &payload(bytes), &RecordingMetadata::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_insert_assigns_unique_increasing_ids() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let first = insert_recording(&store, "u1", b"one").await;
    let second = insert_recording(&store, "u1", b"two").await;
    let third = insert_recording(&store, "u2", b"three").await;

    assert!(first.id < second.id);
    assert!(second.id < third.id);
}

#[tokio::test]
async fn test_get_returns_inserted_record() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let inserted = insert_recording(&store, "u1", b"hello audio").await;
    let fetched = store.get(inserted.id).await.unwrap().unwrap();

    assert_eq!(fetched.id, inserted.id);
    assert_eq!(fetched.user_id, "u1");
    assert_eq!(fetched.audio_payload, payload(b"hello audio"));
    assert_eq!(fetched.status, RecordingStatus::Pending);
    assert_eq!(fetched.retry_count, 0);
    assert_eq!(
        fetched.created_at.timestamp_millis(),
        inserted.created_at.timestamp_millis()
    );
    assert!(fetched.processing_at.is_none());
    assert!(fetched.processed_at.is_none());
    assert!(fetched.result.is_none());
    assert!(fetched.last_error.is_none());
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    assert!(store.get(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_required_missing_is_not_found() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();
    let err = store.get_required(42).await.unwrap_err();
    assert!(matches!(err, QueueError::RecordingNotFound(42)));
}

#[tokio::test]
async fn test_replace_overwrites_full_record() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let mut rec = insert_recording(&store, "u1", b"audio").await;
    rec.status = RecordingStatus::Processed;
    rec.processed_at = Some(chrono::Utc::now());
    rec.result = Some(json!({"amount": 12.5}));
    rec.confidence = Some(0.87);
    store.replace(&rec).await.unwrap();

    let fetched = store.get(rec.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, RecordingStatus::Processed);
    assert_eq!(fetched.result, Some(json!({"amount": 12.5})));
    assert_eq!(fetched.confidence, Some(0.87));
    assert!(fetched.processed_at.is_some());
}

#[tokio::test]
async fn test_query_by_status_returns_insertion_order() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let a = insert_recording(&store, "u1", b"a").await;
    let b = insert_recording(&store, "u1", b"b").await;
    let c = insert_recording(&store, "u1", b"c").await;

    let pending = store.query_by_status(RecordingStatus::Pending).await.unwrap();
    let ids: Vec<i64> = pending.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![a.id, b.id, c.id]);

    assert!(store
        .query_by_status(RecordingStatus::Processed)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_query_user_by_status_scopes_to_user() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let mine = insert_recording(&store, "u1", b"mine").await;
    insert_recording(&store, "u2", b"theirs").await;

    let pending = store
        .query_user_by_status("u1", RecordingStatus::Pending)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, mine.id);
}

#[tokio::test]
async fn test_get_all_and_get_all_for_user() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    insert_recording(&store, "u1", b"a").await;
    insert_recording(&store, "u2", b"b").await;
    insert_recording(&store, "u1", b"c").await;

    assert_eq!(store.get_all().await.unwrap().len(), 3);
    let for_user = store.get_all_for_user("u1").await.unwrap();
    assert_eq!(for_user.len(), 2);
    assert!(for_user.iter().all(|r| r.user_id == "u1"));
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let rec = insert_recording(&store, "u1", b"gone").await;
    store.delete(rec.id).await.unwrap();
    assert!(store.get(rec.id).await.unwrap().is_none());

    // Deleting again is a no-op, not an error
    store.delete(rec.id).await.unwrap();
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = RecordingStore::open(dir.path(), "queue").await.unwrap();
    let rec = insert_recording(&store, "u1", b"durable").await;
    store.close().await;

    let reopened = RecordingStore::open(dir.path(), "queue").await.unwrap();
    let fetched = reopened.get(rec.id).await.unwrap().unwrap();
    assert_eq!(fetched.audio_payload, payload(b"durable"));
    assert_eq!(fetched.status, RecordingStatus::Pending);
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let first = insert_recording(&store, "u1", b"first").await;
    store.delete(first.id).await.unwrap();
    let second = insert_recording(&store, "u1", b"second").await;

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_double_open_fails_with_store_unavailable() {
    let dir = tempfile::tempdir().unwrap();

    let _held = RecordingStore::open(dir.path(), "queue").await.unwrap();
    let err = RecordingStore::open(dir.path(), "queue").await.unwrap_err();

    match err {
        QueueError::StoreUnavailable { reason } => {
            assert!(reason.contains("in use"), "got: {}", reason)
        }
        other => panic!("expected StoreUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_version_mismatch_fails_open() {
    let dir = tempfile::tempdir().unwrap();

    let store = RecordingStore::open(dir.path(), "queue").await.unwrap();
    sqlx::query("UPDATE metadata SET value = '999' WHERE key = 'version'")
        .execute(store.pool())
        .await
        .unwrap();
    store.close().await;

    let err = RecordingStore::open(dir.path(), "queue").await.unwrap_err();
    match err {
        QueueError::StoreUnavailable { reason } => {
            assert!(reason.contains("version"), "got: {}", reason)
        }
        other => panic!("expected StoreUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tampered_payload_is_detected_on_read() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let rec = insert_recording(&store, "u1", b"pristine").await;
    sqlx::query("UPDATE recordings SET audio_payload = 'ZGFtYWdlZA==' WHERE id = ?")
        .bind(rec.id)
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.get(rec.id).await.unwrap_err();
    match err {
        QueueError::StoreUnavailable { reason } => {
            assert!(reason.contains("checksum"), "got: {}", reason)
        }
        other => panic!("expected StoreUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fresh_store_is_stamped_with_version_and_install_id() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let version = db::query_metadata(store.pool(), "version").await.unwrap();
    assert_eq!(version.as_deref(), Some(EXPECTED_DB_VERSION));

    let install_id = db::query_metadata(store.pool(), "install_id")
        .await
        .unwrap()
        .unwrap();
    assert!(install_id.starts_with("install_"), "got: {}", install_id);
}

#[tokio::test]
async fn test_install_id_is_preserved_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let store = RecordingStore::open(dir.path(), "queue").await.unwrap();
    let original = db::query_metadata(store.pool(), "install_id")
        .await
        .unwrap()
        .unwrap();
    store.close().await;

    let reopened = RecordingStore::open(dir.path(), "queue").await.unwrap();
    let after = db::query_metadata(reopened.pool(), "install_id")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original, after);
}

#[tokio::test]
async fn test_metadata_roundtrips_extra_keys() {
    let (store, _guard) = RecordingStore::open_in_temporary_dir().await.unwrap();

    let mut extra = serde_json::Map::new();
    extra.insert("device".to_string(), json!("pixel-7"));
    extra.insert("capture_ms".to_string(), json!(3120));
    let metadata = RecordingMetadata {
        language: "sw".to_string(),
        classification_type: ClassificationType::Inventory,
        extra,
    };

    let rec = store
        .insert("u1", &payload(b"with metadata"), &metadata)
        .await
        .unwrap();
    let fetched = store.get(rec.id).await.unwrap().unwrap();

    assert_eq!(fetched.metadata.language, "sw");
    assert_eq!(
        fetched.metadata.classification_type,
        ClassificationType::Inventory
    );
    assert_eq!(fetched.metadata.extra.get("device"), Some(&json!("pixel-7")));
    assert_eq!(fetched.metadata.extra.get("capture_ms"), Some(&json!(3120)));
}
