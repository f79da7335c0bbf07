use rand::Rng;

/// Expected store schema version
/// All store files must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Maximum classification attempts before a recording is parked as failed
pub const MAX_RETRIES: u32 = 3;

/// Delay between sequential classification calls within one sync run (milliseconds)
/// Backpressure for the remote service; injectable through SyncPolicy for tests
pub const DEFAULT_SYNC_DELAY_MS: u64 = 500;

/// Retention period for processed recordings (in days)
/// For testing: pass an explicit value to cleanup_with_retention
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Timeout for a single classification service call (seconds)
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;

/// Language sent to the classification service when metadata omits one
pub const DEFAULT_LANGUAGE: &str = "en";

/// Generate a unique installation ID
/// Stamped into store metadata the first time a store file is opened
pub fn generate_install_id() -> String {
    format!(
        "install_{}",
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(12)
            .map(char::from)
            .collect::<String>()
    )
}
