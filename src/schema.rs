use sea_query::Iden;

/// Metadata table - key-value store for the store file's own configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Recordings table - queued voice captures and their sync state
#[derive(Iden)]
pub enum Recordings {
    Table,
    Id,
    UserId,
    AudioPayload,
    PayloadCrc32,
    Status,
    RetryCount,
    Metadata,
    CreatedAtMs,
    ProcessingAtMs,
    ProcessedAtMs,
    LastAttemptMs,
    Result,
    Confidence,
    LastError,
}
