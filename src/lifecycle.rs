//! Recording state machine
//!
//! States: pending -> processing -> processed | failed, with failed
//! re-enterable only through an explicit retry. All transitions re-read the
//! record, check the current status, and rewrite the full row; an operation
//! applied to a record in the wrong state is rejected with InvalidTransition
//! rather than silently coerced.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;

use crate::constants::MAX_RETRIES;
use crate::error::{QueueError, Result};
use crate::recording::{Recording, RecordingMetadata, RecordingStatus};
use crate::store::RecordingStore;

/// last_error text left on recordings recovered from an interrupted attempt
pub const INTERRUPTED_ATTEMPT_NOTE: &str = "attempt interrupted before completion";

/// Persist a new pending recording
/// The payload must be non-empty Base64 text; metadata is write-once
pub async fn enqueue(
    store: &RecordingStore,
    user_id: &str,
    audio_payload: &str,
    metadata: RecordingMetadata,
) -> Result<Recording> {
    if audio_payload.is_empty() {
        return Err(QueueError::InvalidPayload(
            "audio payload is empty".to_string(),
        ));
    }
    BASE64
        .decode(audio_payload)
        .map_err(|e| QueueError::InvalidPayload(format!("not valid base64: {}", e)))?;

    let recording = store.insert(user_id, audio_payload, &metadata).await?;
    log::info!(
        "enqueued recording {} for user {} ({}, {})",
        recording.id,
        recording.user_id,
        recording.metadata.classification_type.as_str(),
        recording.metadata.language
    );
    Ok(recording)
}

/// Pending -> processing, stamping processing_at
pub async fn mark_processing(store: &RecordingStore, id: i64) -> Result<Recording> {
    let mut recording = store.get_required(id).await?;
    if recording.status != RecordingStatus::Pending {
        return Err(QueueError::InvalidTransition {
            id,
            from: recording.status,
            action: "mark processing",
        });
    }
    recording.status = RecordingStatus::Processing;
    recording.processing_at = Some(Utc::now());
    store.replace(&recording).await?;
    Ok(recording)
}

/// Processing -> processed, storing the classification result
pub async fn complete_success(
    store: &RecordingStore,
    id: i64,
    result: serde_json::Value,
    confidence: f64,
) -> Result<Recording> {
    let mut recording = store.get_required(id).await?;
    if recording.status != RecordingStatus::Processing {
        return Err(QueueError::InvalidTransition {
            id,
            from: recording.status,
            action: "complete",
        });
    }
    recording.status = RecordingStatus::Processed;
    recording.processed_at = Some(Utc::now());
    recording.result = Some(result);
    recording.confidence = Some(confidence);
    recording.last_error = None;
    store.replace(&recording).await?;
    log::info!("recording {} processed (confidence {:.2})", id, confidence);
    Ok(recording)
}

/// Processing -> pending (retry budget left) or failed (budget exhausted)
/// Charges one attempt against MAX_RETRIES and records the failure reason
pub async fn complete_failure(
    store: &RecordingStore,
    id: i64,
    error: &str,
) -> Result<Recording> {
    let mut recording = store.get_required(id).await?;
    if recording.status != RecordingStatus::Processing {
        return Err(QueueError::InvalidTransition {
            id,
            from: recording.status,
            action: "fail",
        });
    }
    recording.retry_count += 1;
    recording.last_error = Some(error.to_string());
    recording.last_attempt = Some(Utc::now());
    recording.processing_at = None;
    recording.status = if recording.retry_count >= MAX_RETRIES {
        RecordingStatus::Failed
    } else {
        RecordingStatus::Pending
    };
    store.replace(&recording).await?;

    match recording.status {
        RecordingStatus::Failed => log::warn!(
            "recording {} failed permanently after {} attempts: {}",
            id,
            recording.retry_count,
            error
        ),
        _ => log::warn!(
            "recording {} attempt {}/{} failed, will retry: {}",
            id,
            recording.retry_count,
            MAX_RETRIES,
            error
        ),
    }
    Ok(recording)
}

/// Failed -> pending with a fresh retry budget
pub async fn reset_failed(store: &RecordingStore, id: i64) -> Result<Recording> {
    let mut recording = store.get_required(id).await?;
    if recording.status != RecordingStatus::Failed {
        return Err(QueueError::InvalidTransition {
            id,
            from: recording.status,
            action: "reset",
        });
    }
    recording.status = RecordingStatus::Pending;
    recording.retry_count = 0;
    store.replace(&recording).await?;
    log::info!("recording {} reset to pending", id);
    Ok(recording)
}

/// Return recordings orphaned in processing (by a crash or restart) to
/// pending. The interrupted attempt never completed, so retry_count is not
/// charged. Returns the number of recovered recordings.
///
/// Only safe while no classification attempt is in flight; run it right
/// after opening the store (the lock guarantees no other process), never
/// during a sync run.
pub async fn recover_interrupted(store: &RecordingStore) -> Result<u64> {
    let recovered = store
        .reset_processing_to_pending(INTERRUPTED_ATTEMPT_NOTE)
        .await?;
    if recovered > 0 {
        log::warn!("recovered {} interrupted recording(s) to pending", recovered);
    }
    Ok(recovered)
}
