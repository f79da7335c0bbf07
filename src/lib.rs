// Offline voice-capture sync engine: a durable client-side queue of captured
// audio, drained through an external classification service with bounded
// retries, idempotent re-processing, and age-based cleanup.

pub mod classify;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod maintenance;
pub mod queries;
pub mod recording;
pub mod schema;
pub mod store;
pub mod sync;

// Re-export the expected store version for convenience
pub use constants::EXPECTED_DB_VERSION;
