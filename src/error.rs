//! Error types for the sync engine
//!
//! Classification failures are deliberately NOT represented here: the sync
//! driver always converts them into a state transition (see sync.rs), so the
//! only errors that reach callers are store faults and misuse of the API.

use thiserror::Error;

use crate::recording::RecordingStatus;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum QueueError {
    /// The durable store cannot be read or written: I/O failure, lock held
    /// by another process, schema version mismatch, or corrupted contents.
    #[error("recording store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("recording {0} not found")]
    RecordingNotFound(i64),

    /// An operation was applied to a recording whose status does not allow it
    #[error("cannot {action} recording {id}: status is {from}")]
    InvalidTransition {
        id: i64,
        from: RecordingStatus,
        action: &'static str,
    },

    #[error("invalid audio payload: {0}")]
    InvalidPayload(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl QueueError {
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        QueueError::StoreUnavailable {
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::StoreUnavailable {
            reason: e.to_string(),
        }
    }
}

impl From<std::io::Error> for QueueError {
    fn from(e: std::io::Error) -> Self {
        QueueError::StoreUnavailable {
            reason: e.to_string(),
        }
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;
