use sea_query::{Expr, Func, OnConflict, Order, Query, SqliteQueryBuilder};

use crate::recording::RecordingStatus;
use crate::schema::Recordings;

/// Column list for full-record SELECTs, in the order store::recording_from_row expects
fn all_columns() -> [Recordings; 14] {
    [
        Recordings::Id,
        Recordings::UserId,
        Recordings::AudioPayload,
        Recordings::PayloadCrc32,
        Recordings::Status,
        Recordings::RetryCount,
        Recordings::Metadata,
        Recordings::CreatedAtMs,
        Recordings::ProcessingAtMs,
        Recordings::ProcessedAtMs,
        Recordings::LastAttemptMs,
        Recordings::Result,
        Recordings::Confidence,
        Recordings::LastError,
    ]
}

/// INSERT INTO recordings (user_id, audio_payload, payload_crc32, status, retry_count, metadata, created_at_ms)
/// VALUES (?, ?, ?, ?, ?, ?, ?)
/// The store assigns the id; nullable columns stay absent until their transition
pub fn insert(
    user_id: &str,
    audio_payload: &str,
    payload_crc32: i64,
    status: RecordingStatus,
    retry_count: i64,
    metadata_json: &str,
    created_at_ms: i64,
) -> String {
    Query::insert()
        .into_table(Recordings::Table)
        .columns([
            Recordings::UserId,
            Recordings::AudioPayload,
            Recordings::PayloadCrc32,
            Recordings::Status,
            Recordings::RetryCount,
            Recordings::Metadata,
            Recordings::CreatedAtMs,
        ])
        .values_panic([
            user_id.into(),
            audio_payload.into(),
            payload_crc32.into(),
            status.as_str().into(),
            retry_count.into(),
            metadata_json.into(),
            created_at_ms.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// INSERT INTO recordings (id, ...) VALUES (?, ...) ON CONFLICT (id) DO UPDATE SET ...
/// Full-record overwrite by id: every transition rewrites the whole row in one
/// atomic statement (last writer wins)
#[allow(clippy::too_many_arguments)]
pub fn upsert(
    id: i64,
    user_id: &str,
    audio_payload: &str,
    payload_crc32: i64,
    status: RecordingStatus,
    retry_count: i64,
    metadata_json: &str,
    created_at_ms: i64,
    processing_at_ms: Option<i64>,
    processed_at_ms: Option<i64>,
    last_attempt_ms: Option<i64>,
    result_json: Option<&str>,
    confidence: Option<f64>,
    last_error: Option<&str>,
) -> String {
    Query::insert()
        .into_table(Recordings::Table)
        .columns(all_columns())
        .values_panic([
            id.into(),
            user_id.into(),
            audio_payload.into(),
            payload_crc32.into(),
            status.as_str().into(),
            retry_count.into(),
            metadata_json.into(),
            created_at_ms.into(),
            processing_at_ms.into(),
            processed_at_ms.into(),
            last_attempt_ms.into(),
            result_json.map(|s| s.to_string()).into(),
            confidence.into(),
            last_error.map(|s| s.to_string()).into(),
        ])
        .on_conflict(
            OnConflict::column(Recordings::Id)
                .update_columns([
                    Recordings::UserId,
                    Recordings::AudioPayload,
                    Recordings::PayloadCrc32,
                    Recordings::Status,
                    Recordings::RetryCount,
                    Recordings::Metadata,
                    Recordings::CreatedAtMs,
                    Recordings::ProcessingAtMs,
                    Recordings::ProcessedAtMs,
                    Recordings::LastAttemptMs,
                    Recordings::Result,
                    Recordings::Confidence,
                    Recordings::LastError,
                ])
                .to_owned(),
        )
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    Query::select()
        .columns(all_columns())
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE status = ? ORDER BY created_at_ms, id
/// Creation order, insertion order breaking timestamp ties
pub fn select_by_status(status: RecordingStatus) -> String {
    Query::select()
        .columns(all_columns())
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::Status).eq(status.as_str()))
        .order_by(Recordings::CreatedAtMs, Order::Asc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE user_id = ? AND status = ? ORDER BY created_at_ms, id
pub fn select_user_by_status(user_id: &str, status: RecordingStatus) -> String {
    Query::select()
        .columns(all_columns())
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::UserId).eq(user_id))
        .and_where(Expr::col(Recordings::Status).eq(status.as_str()))
        .order_by(Recordings::CreatedAtMs, Order::Asc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings ORDER BY created_at_ms, id
pub fn select_all() -> String {
    Query::select()
        .columns(all_columns())
        .from(Recordings::Table)
        .order_by(Recordings::CreatedAtMs, Order::Asc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE user_id = ? ORDER BY created_at_ms, id
pub fn select_all_for_user(user_id: &str) -> String {
    Query::select()
        .columns(all_columns())
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::UserId).eq(user_id))
        .order_by(Recordings::CreatedAtMs, Order::Asc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM recordings WHERE id = ?
pub fn delete_by_id(id: i64) -> String {
    Query::delete()
        .from_table(Recordings::Table)
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT status, COUNT(id) FROM recordings [WHERE user_id = ?] GROUP BY status
pub fn count_by_status(user_id: Option<&str>) -> String {
    let mut query = Query::select()
        .column(Recordings::Status)
        .expr(Func::count(Expr::col(Recordings::Id)))
        .from(Recordings::Table)
        .group_by_col(Recordings::Status)
        .to_owned();
    if let Some(user_id) = user_id {
        query.and_where(Expr::col(Recordings::UserId).eq(user_id));
    }
    query.to_string(SqliteQueryBuilder)
}

/// DELETE FROM recordings WHERE status = 'processed' AND processed_at_ms < ?
/// Only processed records are ever reaped; failed records stay until the user acts
pub fn delete_processed_before(cutoff_ms: i64) -> String {
    Query::delete()
        .from_table(Recordings::Table)
        .and_where(Expr::col(Recordings::Status).eq(RecordingStatus::Processed.as_str()))
        .and_where(Expr::col(Recordings::ProcessedAtMs).is_not_null())
        .and_where(Expr::col(Recordings::ProcessedAtMs).lt(cutoff_ms))
        .to_string(SqliteQueryBuilder)
}

/// UPDATE recordings SET status = 'pending', processing_at_ms = NULL, last_error = ?
/// WHERE status = 'processing'
/// Recovery for attempts interrupted by a crash or restart; retry_count is not
/// charged because the attempt never completed
pub fn reset_processing_to_pending(note: &str) -> String {
    Query::update()
        .table(Recordings::Table)
        .value(Recordings::Status, RecordingStatus::Pending.as_str())
        .value(Recordings::ProcessingAtMs, Option::<i64>::None)
        .value(Recordings::LastError, note)
        .and_where(Expr::col(Recordings::Status).eq(RecordingStatus::Processing.as_str()))
        .to_string(SqliteQueryBuilder)
}
