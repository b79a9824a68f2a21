//! Error types for the storage side of the system logs.
//!
//! Producers never see these: `add`, `notify_flush`, and `flush` are
//! infallible. They surface only from sink calls made by the flush worker
//! (which logs and discards them) and from read-back queries.

/// Errors a [`crate::LogSink`] can report.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// No pooled connection could be obtained.
    #[error("system log connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A database operation failed.
    #[error("system log database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A record could not be serialised to JSON.
    #[error("system log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The destination is unreachable or refused the batch.
    #[error("system log destination unavailable: {0}")]
    Unavailable(String),
}
