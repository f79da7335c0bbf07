//! Queue maintenance: statistics and age-based cleanup
//!
//! Cleanup only ever touches processed recordings. A failed recording is
//! evidence of an unresolved user-visible error and stays until the user
//! retries or explicitly deletes it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{QueueError, Result};
use crate::recording::RecordingStatus;
use crate::store::RecordingStore;

/// Point-in-time per-status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub processed: i64,
    pub failed: i64,
}

/// Aggregate counts over all recordings, or one user's when given
pub async fn stats(store: &RecordingStore, user_id: Option<&str>) -> Result<QueueStats> {
    let mut stats = QueueStats::default();
    for (status, count) in store.count_by_status(user_id).await? {
        match status {
            RecordingStatus::Pending => stats.pending = count,
            RecordingStatus::Processing => stats.processing = count,
            RecordingStatus::Processed => stats.processed = count,
            RecordingStatus::Failed => stats.failed = count,
        }
        stats.total += count;
    }
    Ok(stats)
}

/// Delete processed recordings older than `retention_days`, measured from now
pub async fn cleanup_with_retention(store: &RecordingStore, retention_days: i64) -> Result<u64> {
    cleanup_with_params(store, retention_days, None).await
}

/// Cleanup with an explicit reference time instead of the current time
/// For testing retention boundaries without real-time clocks
pub async fn cleanup_with_params(
    store: &RecordingStore,
    retention_days: i64,
    reference_time: Option<DateTime<Utc>>,
) -> Result<u64> {
    let days = chrono::Duration::try_days(retention_days).ok_or_else(|| {
        QueueError::InvalidConfig(format!("invalid retention period: {} days", retention_days))
    })?;
    let now = reference_time.unwrap_or_else(Utc::now);
    let cutoff = now - days;

    let deleted = store.delete_processed_before(cutoff).await?;
    if deleted > 0 {
        log::info!(
            "cleaned up {} processed recording(s) older than {} day(s)",
            deleted,
            retention_days
        );
    }
    Ok(deleted)
}

/// Explicit user-triggered removal of one recording, any status; idempotent
pub async fn delete_one(store: &RecordingStore, id: i64) -> Result<()> {
    store.delete(id).await?;
    log::info!("deleted recording {}", id);
    Ok(())
}
