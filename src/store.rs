//! Durable recording store
//!
//! An explicitly constructed, injectable component wrapping a SQLite pool.
//! Every mutation is a single statement, so readers never observe a partially
//! written record; every transition rewrites the whole row (last writer wins).

use chrono::{DateTime, Utc};
use fs2::FileExt;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use crate::db;
use crate::error::{QueueError, Result};
use crate::queries::recordings;
use crate::recording::{Recording, RecordingMetadata, RecordingStatus};

/// Persistent, crash-durable container for recordings
///
/// Holds an exclusive advisory lock on a sibling `.lock` file for its whole
/// lifetime, so a second process opening the same store fails fast instead of
/// racing writes. Cloning shares the pool and the lock.
#[derive(Clone, Debug)]
pub struct RecordingStore {
    pool: SqlitePool,
    _lock: Arc<File>,
}

impl RecordingStore {
    /// Open (creating if needed) the store at `{store_dir}/{name}.sqlite`
    pub async fn open(store_dir: &Path, name: &str) -> Result<RecordingStore> {
        std::fs::create_dir_all(store_dir)?;

        // Acquire exclusive lock to prevent a second instance on the same store
        let lock_path = store_dir.join(format!("{}.lock", name));
        let lock_file = File::create(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| {
            QueueError::store_unavailable(format!(
                "store '{}' is in use by another process (lock file: {})",
                name,
                lock_path.display()
            ))
        })?;

        let db_path = store_dir.join(format!("{}.sqlite", name));
        let pool = db::open_pool(&db_path).await?;
        db::init_schema(&pool).await?;
        db::stamp_or_validate_metadata(&pool).await?;
        log::info!("recording store opened at {}", db_path.display());

        Ok(RecordingStore {
            pool,
            _lock: Arc::new(lock_file),
        })
    }

    /// Open an isolated store in a fresh temporary directory
    /// Keep the returned TempDir alive for the duration of the test
    pub async fn open_in_temporary_dir() -> Result<(RecordingStore, TempDir)> {
        let dir = tempfile::tempdir()?;
        let store = RecordingStore::open(dir.path(), "queue").await?;
        Ok((store, dir))
    }

    /// Close the pool and release the lock
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Raw pool access, for test verification queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a new pending recording; the store assigns the id
    pub async fn insert(
        &self,
        user_id: &str,
        audio_payload: &str,
        metadata: &RecordingMetadata,
    ) -> Result<Recording> {
        let created_at = Utc::now();
        let payload_crc32 = crc32fast::hash(audio_payload.as_bytes());
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| QueueError::store_unavailable(format!("cannot encode metadata: {}", e)))?;

        let sql = recordings::insert(
            user_id,
            audio_payload,
            payload_crc32 as i64,
            RecordingStatus::Pending,
            0,
            &metadata_json,
            created_at.timestamp_millis(),
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&self.pool)
            .await?;

        Ok(Recording {
            id,
            user_id: user_id.to_string(),
            audio_payload: audio_payload.to_string(),
            payload_crc32,
            status: RecordingStatus::Pending,
            retry_count: 0,
            metadata: metadata.clone(),
            created_at,
            processing_at: None,
            processed_at: None,
            last_attempt: None,
            result: None,
            confidence: None,
            last_error: None,
        })
    }

    /// Full-record overwrite by id, in one atomic statement
    pub async fn replace(&self, recording: &Recording) -> Result<()> {
        let metadata_json = serde_json::to_string(&recording.metadata)
            .map_err(|e| QueueError::store_unavailable(format!("cannot encode metadata: {}", e)))?;
        let result_json = match &recording.result {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| {
                QueueError::store_unavailable(format!("cannot encode result: {}", e))
            })?),
            None => None,
        };

        let sql = recordings::upsert(
            recording.id,
            &recording.user_id,
            &recording.audio_payload,
            recording.payload_crc32 as i64,
            recording.status,
            recording.retry_count as i64,
            &metadata_json,
            recording.created_at.timestamp_millis(),
            recording.processing_at.map(|t| t.timestamp_millis()),
            recording.processed_at.map(|t| t.timestamp_millis()),
            recording.last_attempt.map(|t| t.timestamp_millis()),
            result_json.as_deref(),
            recording.confidence,
            recording.last_error.as_deref(),
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Recording>> {
        let sql = recordings::select_by_id(id);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.map(|r| recording_from_row(&r)).transpose()
    }

    /// Like get, but a missing id is an error
    pub async fn get_required(&self, id: i64) -> Result<Recording> {
        self.get(id)
            .await?
            .ok_or(QueueError::RecordingNotFound(id))
    }

    /// All recordings with the given status, in creation order
    /// (insertion order breaking timestamp ties)
    pub async fn query_by_status(&self, status: RecordingStatus) -> Result<Vec<Recording>> {
        let sql = recordings::select_by_status(status);
        self.fetch_recordings(&sql).await
    }

    /// One user's recordings with the given status, in creation order
    pub async fn query_user_by_status(
        &self,
        user_id: &str,
        status: RecordingStatus,
    ) -> Result<Vec<Recording>> {
        let sql = recordings::select_user_by_status(user_id, status);
        self.fetch_recordings(&sql).await
    }

    pub async fn get_all(&self) -> Result<Vec<Recording>> {
        self.fetch_recordings(&recordings::select_all()).await
    }

    pub async fn get_all_for_user(&self, user_id: &str) -> Result<Vec<Recording>> {
        self.fetch_recordings(&recordings::select_all_for_user(user_id))
            .await
    }

    /// Remove a recording; deleting an absent id is a no-op
    pub async fn delete(&self, id: i64) -> Result<()> {
        let sql = recordings::delete_by_id(id);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Per-status record counts, optionally scoped to one user
    /// Statuses with no records are absent from the result
    pub async fn count_by_status(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<(RecordingStatus, i64)>> {
        let sql = recordings::count_by_status(user_id);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let status_text: String = row.try_get(0)?;
            let count: i64 = row.try_get(1)?;
            let status = RecordingStatus::parse(&status_text).ok_or_else(|| {
                QueueError::store_unavailable(format!(
                    "store contains unknown status '{}'",
                    status_text
                ))
            })?;
            counts.push((status, count));
        }
        Ok(counts)
    }

    /// Delete processed recordings whose processed_at is before the cutoff
    /// Returns the number of rows deleted
    pub async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let sql = recordings::delete_processed_before(cutoff.timestamp_millis());
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Return every processing recording to pending, keeping its retry count
    /// Returns the number of rows updated
    pub async fn reset_processing_to_pending(&self, note: &str) -> Result<u64> {
        let sql = recordings::reset_processing_to_pending(note);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_recordings(&self, sql: &str) -> Result<Vec<Recording>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(recording_from_row).collect()
    }
}

/// Decode a full recordings row, verifying the payload checksum
/// Column order must match queries::recordings::all_columns
fn recording_from_row(row: &SqliteRow) -> Result<Recording> {
    let id: i64 = row.try_get(0)?;
    let user_id: String = row.try_get(1)?;
    let audio_payload: String = row.try_get(2)?;
    let payload_crc32: i64 = row.try_get(3)?;
    let status_text: String = row.try_get(4)?;
    let retry_count: i64 = row.try_get(5)?;
    let metadata_json: String = row.try_get(6)?;
    let created_at_ms: i64 = row.try_get(7)?;
    let processing_at_ms: Option<i64> = row.try_get(8)?;
    let processed_at_ms: Option<i64> = row.try_get(9)?;
    let last_attempt_ms: Option<i64> = row.try_get(10)?;
    let result_json: Option<String> = row.try_get(11)?;
    let confidence: Option<f64> = row.try_get(12)?;
    let last_error: Option<String> = row.try_get(13)?;

    let computed_crc = crc32fast::hash(audio_payload.as_bytes());
    if computed_crc as i64 != payload_crc32 {
        return Err(QueueError::store_unavailable(format!(
            "payload checksum mismatch for recording {} (stored {}, computed {})",
            id, payload_crc32, computed_crc
        )));
    }

    let status = RecordingStatus::parse(&status_text).ok_or_else(|| {
        QueueError::store_unavailable(format!(
            "recording {} has unknown status '{}'",
            id, status_text
        ))
    })?;
    let metadata: RecordingMetadata = serde_json::from_str(&metadata_json).map_err(|e| {
        QueueError::store_unavailable(format!("recording {} has corrupt metadata: {}", id, e))
    })?;
    let result = match result_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            QueueError::store_unavailable(format!("recording {} has corrupt result: {}", id, e))
        })?),
        None => None,
    };

    Ok(Recording {
        id,
        user_id,
        audio_payload,
        payload_crc32: payload_crc32 as u32,
        status,
        retry_count: retry_count as u32,
        metadata,
        created_at: timestamp_from_ms(id, created_at_ms)?,
        processing_at: processing_at_ms.map(|ms| timestamp_from_ms(id, ms)).transpose()?,
        processed_at: processed_at_ms.map(|ms| timestamp_from_ms(id, ms)).transpose()?,
        last_attempt: last_attempt_ms.map(|ms| timestamp_from_ms(id, ms)).transpose()?,
        result,
        confidence,
        last_error,
    })
}

fn timestamp_from_ms(id: i64, ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        QueueError::store_unavailable(format!(
            "recording {} has out-of-range timestamp {}",
            id, ms
        ))
    })
}
