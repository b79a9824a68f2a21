//! Query execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a query's life a [`QueryLog`] row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// The query was parsed and is about to execute.
    QueryStart,
    /// The query completed successfully.
    QueryFinish,
    /// The query failed before execution started.
    ExceptionBeforeStart,
    /// The query failed while running.
    ExceptionWhileProcessing,
}

impl QueryKind {
    /// Returns the canonical label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueryStart => "QueryStart",
            Self::QueryFinish => "QueryFinish",
            Self::ExceptionBeforeStart => "ExceptionBeforeStart",
            Self::ExceptionWhileProcessing => "ExceptionWhileProcessing",
        }
    }

    /// Whether this kind describes a failed query.
    pub fn is_exception(self) -> bool {
        matches!(
            self,
            Self::ExceptionBeforeStart | Self::ExceptionWhileProcessing
        )
    }
}

/// One row of `query_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLog {
    pub kind: QueryKind,
    pub event_time: DateTime<Utc>,
    pub query_id: String,
    pub query: String,
    pub user: String,
    pub query_duration_ms: u64,
    pub read_rows: u64,
    pub written_rows: u64,
    pub result_rows: u64,
    pub memory_usage: u64,
    /// Error text for the exception kinds.
    pub exception: Option<String>,
}

crate::log_record!(QueryLog, "QueryLog", "query_log");

/// Per-thread execution statistics for a query (`query_thread_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryThreadLog {
    pub event_time: DateTime<Utc>,
    pub query_id: String,
    pub thread_name: String,
    pub thread_id: u64,
    pub master_thread_id: u64,
    pub query_duration_ms: u64,
    pub read_rows: u64,
    pub written_rows: u64,
    pub memory_usage: i64,
    pub peak_memory_usage: i64,
}

crate::log_record!(QueryThreadLog, "QueryThreadLog", "query_thread_log");

/// Kind of view a dependent query pushed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    Default,
    Materialized,
    Live,
    Window,
}

/// Outcome of a view refresh triggered by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryViewStatus {
    QueryStart,
    QueryFinish,
    ExceptionBeforeStart,
    ExceptionWhileProcessing,
}

/// One row of `query_views_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryViewsLog {
    pub event_time: DateTime<Utc>,
    pub initial_query_id: String,
    pub view_name: String,
    pub view_kind: ViewKind,
    pub view_target: String,
    pub view_duration_ms: u64,
    pub read_rows: u64,
    pub written_rows: u64,
    pub status: QueryViewStatus,
    pub exception: Option<String>,
}

crate::log_record!(QueryViewsLog, "QueryViewsLog", "query_views_log");

/// Timing of one pipeline processor (`processors_profile_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorProfileLog {
    pub event_time: DateTime<Utc>,
    pub id: u64,
    pub parent_ids: Vec<u64>,
    pub plan_step: u64,
    pub query_id: String,
    pub processor_name: String,
    pub elapsed_us: u64,
    pub input_wait_elapsed_us: u64,
    pub output_wait_elapsed_us: u64,
    pub input_rows: u64,
    pub input_bytes: u64,
    pub output_rows: u64,
    pub output_bytes: u64,
}

crate::log_record!(
    ProcessorProfileLog,
    "ProcessorsProfileLog",
    "processors_profile_log"
);

/// Result of an asynchronous insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsynchronousInsertStatus {
    Ok,
    ParsingError,
    FlushError,
}

/// One buffered asynchronous insert (`asynchronous_insert_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsynchronousInsertLog {
    pub event_time: DateTime<Utc>,
    pub query: String,
    pub database: String,
    pub table: String,
    pub format: String,
    pub query_id: String,
    pub bytes: u64,
    pub rows: u64,
    pub exception: Option<String>,
    pub status: AsynchronousInsertStatus,
    pub flush_time: Option<DateTime<Utc>>,
    pub flush_query_id: Option<String>,
}

crate::log_record!(
    AsynchronousInsertLog,
    "AsynchronousInsertLog",
    "asynchronous_insert_log"
);
