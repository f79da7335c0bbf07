use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Metadata, Recordings};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS recordings (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     user_id TEXT NOT NULL,
///     audio_payload TEXT NOT NULL,
///     payload_crc32 INTEGER NOT NULL,
///     status TEXT NOT NULL,
///     retry_count INTEGER NOT NULL DEFAULT 0,
///     metadata TEXT NOT NULL,
///     created_at_ms INTEGER NOT NULL,
///     processing_at_ms INTEGER,
///     processed_at_ms INTEGER,
///     last_attempt_ms INTEGER,
///     result TEXT,
///     confidence REAL,
///     last_error TEXT
/// )
pub fn create_recordings_table() -> String {
    Table::create()
        .table(Recordings::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Recordings::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Recordings::UserId).string().not_null())
        .col(ColumnDef::new(Recordings::AudioPayload).string().not_null())
        .col(
            ColumnDef::new(Recordings::PayloadCrc32)
                .big_integer()
                .not_null(),
        )
        .col(ColumnDef::new(Recordings::Status).string().not_null())
        .col(
            ColumnDef::new(Recordings::RetryCount)
                .integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(Recordings::Metadata).string().not_null())
        .col(
            ColumnDef::new(Recordings::CreatedAtMs)
                .big_integer()
                .not_null(),
        )
        .col(ColumnDef::new(Recordings::ProcessingAtMs).big_integer())
        .col(ColumnDef::new(Recordings::ProcessedAtMs).big_integer())
        .col(ColumnDef::new(Recordings::LastAttemptMs).big_integer())
        .col(ColumnDef::new(Recordings::Result).string())
        .col(ColumnDef::new(Recordings::Confidence).double())
        .col(ColumnDef::new(Recordings::LastError).string())
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(status, created_at_ms)
pub fn create_recordings_status_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_recordings_status")
        .table(Recordings::Table)
        .col(Recordings::Status)
        .col(Recordings::CreatedAtMs)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_recordings_user ON recordings(user_id, status)
pub fn create_recordings_user_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_recordings_user")
        .table(Recordings::Table)
        .col(Recordings::UserId)
        .col(Recordings::Status)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_recordings_processed_at ON recordings(status, processed_at_ms)
pub fn create_recordings_processed_at_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_recordings_processed_at")
        .table(Recordings::Table)
        .col(Recordings::Status)
        .col(Recordings::ProcessedAtMs)
        .to_string(SqliteQueryBuilder)
}
