//! SQLite pool plumbing for the recording store
//!
//! Opening, idempotent schema creation, and the metadata stamping/validation
//! that makes a store file recognizable across versions. The typed operations
//! live in store.rs; this module only deals in pools and raw SQL.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::constants::{generate_install_id, EXPECTED_DB_VERSION};
use crate::error::{QueueError, Result};
use crate::queries::{ddl, metadata};

/// Open a file-based pool with WAL mode and foreign keys enabled
/// Creates the database file if it does not exist
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create tables and indexes if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for sql in [
        ddl::create_metadata_table(),
        ddl::create_recordings_table(),
        ddl::create_recordings_status_index(),
        ddl::create_recordings_user_index(),
        ddl::create_recordings_processed_at_index(),
    ] {
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

/// Read a single metadata value by key
pub async fn query_metadata(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let sql = metadata::select_by_key(key);
    let value: Option<String> = sqlx::query_scalar(&sql).fetch_optional(pool).await?;
    Ok(value)
}

/// Stamp a fresh store with its version and install id, or validate an
/// existing one against the expected schema version
pub async fn stamp_or_validate_metadata(pool: &SqlitePool) -> Result<()> {
    match query_metadata(pool, "version").await? {
        Some(version) if version != EXPECTED_DB_VERSION => Err(QueueError::store_unavailable(
            format!(
                "store has unsupported schema version '{}' (expected '{}')",
                version, EXPECTED_DB_VERSION
            ),
        )),
        Some(_) => Ok(()),
        None => {
            let install_id = generate_install_id();
            for (key, value) in [
                ("version", EXPECTED_DB_VERSION),
                ("install_id", install_id.as_str()),
            ] {
                let sql = metadata::insert(key, value);
                sqlx::query(&sql).execute(pool).await?;
            }
            log::info!("initialized new store with install_id {}", install_id);
            Ok(())
        }
    }
}
