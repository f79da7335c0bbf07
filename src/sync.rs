//! Sync driver
//!
//! Drains a user's pending recordings through the classification service,
//! strictly one at a time with a fixed inter-item delay. The delay is
//! backpressure for the remote service and bounds memory use on constrained
//! devices; tests inject a zero-delay policy.
//!
//! One process_all call performs exactly one attempt per snapshotted
//! recording: a recording that fails back to pending (and anything enqueued
//! after the snapshot) waits for the next trigger.

use std::time::Duration;

use crate::classify::Classifier;
use crate::constants::DEFAULT_SYNC_DELAY_MS;
use crate::error::{QueueError, Result};
use crate::lifecycle;
use crate::recording::RecordingStatus;
use crate::store::RecordingStore;

/// Pacing for one sync run
#[derive(Debug, Clone, Copy)]
pub struct SyncPolicy {
    /// Pause between consecutive classification calls
    pub delay_between_items: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy {
            delay_between_items: Duration::from_millis(DEFAULT_SYNC_DELAY_MS),
        }
    }
}

impl SyncPolicy {
    pub fn no_delay() -> Self {
        SyncPolicy {
            delay_between_items: Duration::ZERO,
        }
    }
}

/// Result of processing a single recording
///
/// Classification failures land here as `success: false`; they are never
/// surfaced as errors.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub success: bool,
    /// The recording was already processed; nothing was changed
    pub already_processed: bool,
    /// Status after the attempt
    pub status: RecordingStatus,
    pub retry_count: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Result of one process_all run
///
/// `failed` counts recordings that exhausted their retry budget during this
/// run; a recording returned to pending for a later retry counts in neither
/// `processed` nor `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Result of a retry_failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySummary {
    /// Failed recordings returned to pending before the run
    pub retried: usize,
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Drives pending recordings through the classification service
pub struct SyncDriver<'a> {
    store: &'a RecordingStore,
    classifier: &'a dyn Classifier,
    policy: SyncPolicy,
}

impl<'a> SyncDriver<'a> {
    pub fn new(store: &'a RecordingStore, classifier: &'a dyn Classifier) -> SyncDriver<'a> {
        SyncDriver {
            store,
            classifier,
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> SyncDriver<'a> {
        self.policy = policy;
        self
    }

    /// Run the full processing transition for a single recording
    ///
    /// Resolves with an outcome for every classification result; only store
    /// faults and a nonexistent id propagate as errors.
    pub async fn process_one(&self, id: i64) -> Result<ProcessOutcome> {
        let recording = self.store.get_required(id).await?;

        match recording.status {
            // Re-processing a processed recording is an idempotent no-op
            RecordingStatus::Processed => {
                return Ok(ProcessOutcome {
                    success: true,
                    already_processed: true,
                    status: RecordingStatus::Processed,
                    retry_count: recording.retry_count,
                    result: recording.result,
                    error: None,
                });
            }
            RecordingStatus::Processing | RecordingStatus::Failed => {
                return Ok(ProcessOutcome {
                    success: false,
                    already_processed: false,
                    status: recording.status,
                    retry_count: recording.retry_count,
                    result: None,
                    error: Some(format!(
                        "recording {} is {}; not eligible for processing",
                        id, recording.status
                    )),
                });
            }
            RecordingStatus::Pending => {}
        }

        let recording = lifecycle::mark_processing(self.store, id).await?;
        let outcome = self
            .classifier
            .classify(
                &recording.audio_payload,
                &recording.metadata.language,
                &recording.user_id,
            )
            .await;

        // A concurrent writer (another sync run, a manual retry, a delete)
        // may have moved the record while the classifier call was in flight.
        // A completion that no longer applies is a lost race, resolved as an
        // unsuccessful outcome with no further state change.
        match outcome {
            Ok(classification) => {
                match lifecycle::complete_success(
                    self.store,
                    id,
                    classification.result,
                    classification.confidence,
                )
                .await
                {
                    Ok(updated) => Ok(ProcessOutcome {
                        success: true,
                        already_processed: false,
                        status: updated.status,
                        retry_count: updated.retry_count,
                        result: updated.result,
                        error: None,
                    }),
                    Err(QueueError::InvalidTransition { from, .. }) => {
                        Ok(lost_race_outcome(id, from, recording.retry_count))
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                match lifecycle::complete_failure(self.store, id, &e.to_string()).await {
                    Ok(updated) => Ok(ProcessOutcome {
                        success: false,
                        already_processed: false,
                        status: updated.status,
                        retry_count: updated.retry_count,
                        result: None,
                        error: updated.last_error,
                    }),
                    Err(QueueError::InvalidTransition { from, .. }) => {
                        Ok(lost_race_outcome(id, from, recording.retry_count))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Drain the user's pending snapshot, sequentially with the policy delay
    ///
    /// Recordings currently in processing are left alone: a concurrently
    /// invoked run may be awaiting the classifier for them. Crash-orphaned
    /// processing records are recovered at store open (lifecycle
    /// recover_interrupted), where no attempt can be in flight.
    pub async fn process_all(&self, user_id: &str) -> Result<BatchSummary> {
        let snapshot = self
            .store
            .query_user_by_status(user_id, RecordingStatus::Pending)
            .await?;
        let total = snapshot.len();
        if total == 0 {
            log::info!("[{}] no pending recordings", user_id);
            return Ok(BatchSummary {
                processed: 0,
                failed: 0,
                total: 0,
            });
        }

        log::info!("[{}] syncing {} pending recording(s)", user_id, total);
        let mut processed = 0;
        let mut failed = 0;
        for (idx, recording) in snapshot.iter().enumerate() {
            log::info!(
                "[{}] ({}/{}) processing recording {}",
                user_id,
                idx + 1,
                total,
                recording.id
            );
            let outcome = self.process_one(recording.id).await?;
            if outcome.success {
                processed += 1;
            } else if outcome.status == RecordingStatus::Failed {
                failed += 1;
            }

            if idx + 1 < total && !self.policy.delay_between_items.is_zero() {
                tokio::time::sleep(self.policy.delay_between_items).await;
            }
        }

        log::info!(
            "[{}] sync run complete: {} processed, {} failed, {} total",
            user_id,
            processed,
            failed,
            total
        );
        Ok(BatchSummary {
            processed,
            failed,
            total,
        })
    }

    /// Reset every failed recording for the user to pending, then process_all
    pub async fn retry_failed(&self, user_id: &str) -> Result<RetrySummary> {
        let failed_recordings = self
            .store
            .query_user_by_status(user_id, RecordingStatus::Failed)
            .await?;
        for recording in &failed_recordings {
            lifecycle::reset_failed(self.store, recording.id).await?;
        }
        let retried = failed_recordings.len();
        if retried > 0 {
            log::info!("[{}] retrying {} failed recording(s)", user_id, retried);
        }

        let batch = self.process_all(user_id).await?;
        Ok(RetrySummary {
            retried,
            processed: batch.processed,
            failed: batch.failed,
            total: batch.total,
        })
    }
}

/// Outcome for an attempt whose completion lost a race with another writer
fn lost_race_outcome(id: i64, status: RecordingStatus, retry_count: u32) -> ProcessOutcome {
    log::warn!(
        "recording {} was moved to {} by a concurrent writer during classification",
        id,
        status
    );
    ProcessOutcome {
        success: false,
        already_processed: false,
        status,
        retry_count,
        result: None,
        error: Some(format!(
            "recording {} was modified by a concurrent writer during classification",
            id
        )),
    }
}
