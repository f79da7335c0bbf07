use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_LANGUAGE;

/// Sync state of a queued recording
///
/// Transitions are owned by the lifecycle module; nothing else writes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Waiting for a sync run to pick it up
    Pending,
    /// A classification attempt is in flight
    Processing,
    /// Classification succeeded; result is stored on the recording
    Processed,
    /// Retry budget exhausted; stays visible until the user retries or deletes
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Pending => "pending",
            RecordingStatus::Processing => "processing",
            RecordingStatus::Processed => "processed",
            RecordingStatus::Failed => "failed",
        }
    }

    /// Parse a status stored in the database; None for unknown text
    pub fn parse(s: &str) -> Option<RecordingStatus> {
        match s {
            "pending" => Some(RecordingStatus::Pending),
            "processing" => Some(RecordingStatus::Processing),
            "processed" => Some(RecordingStatus::Processed),
            "failed" => Some(RecordingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of structured record the service should extract from the audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationType {
    Booking,
    Inventory,
    Task,
    Transaction,
}

impl Default for ClassificationType {
    /// Transaction is the finance app's primary capture flow
    fn default() -> Self {
        ClassificationType::Transaction
    }
}

impl ClassificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationType::Booking => "booking",
            ClassificationType::Inventory => "inventory",
            ClassificationType::Task => "task",
            ClassificationType::Transaction => "transaction",
        }
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Capture-time options, set at enqueue and immutable afterwards
///
/// Unknown keys are kept in `extra` so older clients' captures survive a
/// schema addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Language hint sent to the classification service (default: "en")
    #[serde(default = "default_language")]
    pub language: String,
    /// Classification type (default: transaction)
    #[serde(default)]
    pub classification_type: ClassificationType,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for RecordingMetadata {
    fn default() -> Self {
        RecordingMetadata {
            language: default_language(),
            classification_type: ClassificationType::default(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A queued voice capture and its sync state
///
/// `id`, `user_id`, `audio_payload`, `payload_crc32` and `metadata` are
/// write-once at enqueue; everything else is owned by the state machine.
#[derive(Debug, Clone)]
pub struct Recording {
    /// Store-assigned id, unique and never reused
    pub id: i64,
    pub user_id: String,
    /// Base64 text of the captured audio
    pub audio_payload: String,
    /// CRC32 of the payload text, verified on every read
    pub payload_crc32: u32,
    pub status: RecordingStatus,
    pub retry_count: u32,
    pub metadata: RecordingMetadata,
    pub created_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Structured record returned by the classification service
    pub result: Option<serde_json::Value>,
    /// Classifier confidence in [0, 1], stored alongside the result
    pub confidence: Option<f64>,
    pub last_error: Option<String>,
}
