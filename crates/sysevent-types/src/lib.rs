//! Record schemas for the engine's system logs.
//!
//! Every structured event that a query thread or background service can
//! append to a system log is one of the record types defined here. The set is
//! closed: the registry in `sysevent-log` constructs exactly one log per
//! schema, keyed by [`LogRecord::table_name`].
//!
//! | Schema | Table |
//! |--------|-------|
//! | [`QueryLog`] | `query_log` |
//! | [`QueryThreadLog`] | `query_thread_log` |
//! | [`QueryViewsLog`] | `query_views_log` |
//! | [`ProcessorProfileLog`] | `processors_profile_log` |
//! | [`AsynchronousInsertLog`] | `asynchronous_insert_log` |
//! | [`MetricLog`] | `metric_log` |
//! | [`AsynchronousMetricLog`] | `asynchronous_metric_log` |
//! | [`TraceLog`] | `trace_log` |
//! | [`CrashLog`] | `crash_log` |
//! | [`TextLog`] | `text_log` |
//! | [`OpenTelemetrySpanLog`] | `opentelemetry_span_log` |
//! | [`PartLog`] | `part_log` |
//! | [`TransactionsInfoLog`] | `transactions_info_log` |
//! | [`FilesystemCacheLog`] | `filesystem_cache_log` |
//! | [`FilesystemReadPrefetchesLog`] | `filesystem_read_prefetches_log` |
//! | [`SessionLog`] | `session_log` |
//! | [`ZooKeeperLog`] | `zookeeper_log` |
//!
//! Records carry no behaviour beyond serialisation and a stable name; where
//! and how they are persisted is the sink's concern.

use chrono::{DateTime, Utc};
use serde::Serialize;

mod metric;
mod query;
mod session;
mod storage;
mod text;

pub use metric::{
    AsynchronousMetricLog, CrashLog, MetricLog, OpenTelemetrySpanLog, SpanKind, TraceKind,
    TraceLog,
};
pub use query::{
    AsynchronousInsertLog, AsynchronousInsertStatus, ProcessorProfileLog, QueryKind, QueryLog,
    QueryThreadLog, QueryViewStatus, QueryViewsLog, ViewKind,
};
pub use session::{SessionEventKind, SessionLog, ZooKeeperEventKind, ZooKeeperLog};
pub use storage::{
    CacheReadKind, FilesystemCacheLog, FilesystemReadPrefetchesLog, PartEventKind, PartLog,
    PrefetchState, TransactionEventKind, TransactionsInfoLog,
};
pub use text::{LogLevel, ParseLogLevelError, TextLog};

/// Capability every system log record must provide.
///
/// The queue and worker are generic over this trait; nothing else about a
/// record is inspected by the logging core.
pub trait LogRecord: Serialize + Send + 'static {
    /// Version of the persisted shape. A sink that finds a table written by a
    /// different version moves it aside before creating a fresh one.
    const SCHEMA_VERSION: u32 = 1;

    /// Stable schema name, used to label diagnostics (e.g. `"QueryLog"`).
    fn name() -> &'static str;

    /// Destination table name (e.g. `"query_log"`).
    fn table_name() -> &'static str;

    /// When the recorded event happened.
    fn event_time(&self) -> DateTime<Utc>;
}

/// Implements [`LogRecord`] for a record struct with an `event_time` field.
macro_rules! log_record {
    ($ty:ty, $name:literal, $table:literal) => {
        $crate::log_record!($ty, $name, $table, 1);
    };
    ($ty:ty, $name:literal, $table:literal, $version:literal) => {
        impl $crate::LogRecord for $ty {
            const SCHEMA_VERSION: u32 = $version;

            fn name() -> &'static str {
                $name
            }

            fn table_name() -> &'static str {
                $table
            }

            fn event_time(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.event_time
            }
        }
    };
}
pub(crate) use log_record;

/// Table names of the closed record set, in registration order.
pub const ALL_RECORD_TABLES: &[&str] = &[
    "asynchronous_metric_log",
    "crash_log",
    "metric_log",
    "opentelemetry_span_log",
    "part_log",
    "query_log",
    "query_thread_log",
    "query_views_log",
    "session_log",
    "trace_log",
    "transactions_info_log",
    "zookeeper_log",
    "processors_profile_log",
    "text_log",
    "filesystem_cache_log",
    "filesystem_read_prefetches_log",
    "asynchronous_insert_log",
];
