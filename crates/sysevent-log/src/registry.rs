//! The set of system logs owned by one server instance.
//!
//! [`SystemLogs`] holds one [`SystemLog`] per record schema, each optional so
//! configuration can disable individual logs. Everything the administrative
//! surface needs ("flush all logs and wait", stats, read-back) goes through
//! the type-erased [`SystemLogHandle`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sysevent_db::DbPool;
use sysevent_types::{
    AsynchronousInsertLog, AsynchronousMetricLog, CrashLog, FilesystemCacheLog,
    FilesystemReadPrefetchesLog, LogRecord, MetricLog, OpenTelemetrySpanLog, PartLog,
    ProcessorProfileLog, QueryLog, QueryThreadLog, QueryViewsLog, SessionLog, TextLog, TraceLog,
    TransactionsInfoLog, ZooKeeperLog,
};

use crate::error::SinkError;
use crate::log::{LogStats, SystemLog};
use crate::settings::LogSettings;
use crate::sink::PersistedRow;
use crate::state::{FlushOutcome, FlushTicket};

/// Schema-independent view of a [`SystemLog`].
pub trait SystemLogHandle: Send + Sync {
    fn name(&self) -> &'static str;
    fn table_name(&self) -> &'static str;
    fn startup(&self);
    fn notify_flush(&self, force: bool) -> u64;
    fn request_flush(&self, force: bool) -> FlushTicket;
    fn wait_flushed(&self, ticket: FlushTicket) -> FlushOutcome;
    fn flush(&self, force: bool) -> FlushOutcome;
    fn stop_flush_thread(&self);
    fn shutdown(&self);
    fn stats(&self) -> LogStats;
    fn recent_events(&self, limit: usize) -> Result<Vec<PersistedRow>, SinkError>;
}

impl<R: LogRecord> SystemLogHandle for SystemLog<R> {
    fn name(&self) -> &'static str {
        R::name()
    }

    fn table_name(&self) -> &'static str {
        R::table_name()
    }

    fn startup(&self) {
        SystemLog::startup(self)
    }

    fn notify_flush(&self, force: bool) -> u64 {
        SystemLog::notify_flush(self, force)
    }

    fn request_flush(&self, force: bool) -> FlushTicket {
        SystemLog::request_flush(self, force)
    }

    fn wait_flushed(&self, ticket: FlushTicket) -> FlushOutcome {
        SystemLog::wait_flushed(self, ticket)
    }

    fn flush(&self, force: bool) -> FlushOutcome {
        SystemLog::flush(self, force)
    }

    fn stop_flush_thread(&self) {
        SystemLog::stop_flush_thread(self)
    }

    fn shutdown(&self) {
        SystemLog::shutdown(self)
    }

    fn stats(&self) -> LogStats {
        SystemLog::stats(self)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<PersistedRow>, SinkError> {
        SystemLog::recent_events(self, limit)
    }
}

/// Per-log result of [`SystemLogs::flush_all`].
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    pub name: &'static str,
    pub table: &'static str,
    #[serde(flatten)]
    pub outcome: FlushOutcome,
}

fn build<R: LogRecord>(
    pool: &DbPool,
    settings: LogSettings,
    disabled: &HashSet<&str>,
) -> Option<Arc<SystemLog<R>>> {
    if disabled.contains(R::table_name()) {
        tracing::info!(log = R::name(), table = R::table_name(), "system log disabled");
        return None;
    }
    Some(Arc::new(SystemLog::with_sqlite(pool.clone(), settings)))
}

macro_rules! system_logs {
    ($($field:ident: $record:ty),* $(,)?) => {
        /// One optional log per record schema.
        pub struct SystemLogs {
            $(pub $field: Option<Arc<SystemLog<$record>>>,)*
        }

        impl SystemLogs {
            /// Builds every log not named in `disabled` (by table name),
            /// writing through `pool`. Nothing is started yet.
            pub fn new(pool: &DbPool, settings: LogSettings, disabled: &[String]) -> Self {
                let disabled: HashSet<&str> = disabled.iter().map(String::as_str).collect();
                Self {
                    $($field: build::<$record>(pool, settings, &disabled),)*
                }
            }

            /// Every enabled log, in registration order.
            pub fn all(&self) -> Vec<Arc<dyn SystemLogHandle>> {
                let mut logs: Vec<Arc<dyn SystemLogHandle>> = Vec::new();
                $(
                    if let Some(log) = &self.$field {
                        logs.push(log.clone());
                    }
                )*
                logs
            }
        }
    };
}

system_logs! {
    asynchronous_metric_log: AsynchronousMetricLog,
    crash_log: CrashLog,
    metric_log: MetricLog,
    opentelemetry_span_log: OpenTelemetrySpanLog,
    part_log: PartLog,
    query_log: QueryLog,
    query_thread_log: QueryThreadLog,
    query_views_log: QueryViewsLog,
    session_log: SessionLog,
    trace_log: TraceLog,
    transactions_info_log: TransactionsInfoLog,
    zookeeper_log: ZooKeeperLog,
    processors_profile_log: ProcessorProfileLog,
    text_log: TextLog,
    filesystem_cache_log: FilesystemCacheLog,
    filesystem_read_prefetches_log: FilesystemReadPrefetchesLog,
    asynchronous_insert_log: AsynchronousInsertLog,
}

impl SystemLogs {
    /// Looks up an enabled log by table name.
    pub fn get(&self, table: &str) -> Option<Arc<dyn SystemLogHandle>> {
        self.all().into_iter().find(|log| log.table_name() == table)
    }

    pub fn startup_all(&self) {
        for log in self.all() {
            log.startup();
        }
    }

    /// Flushes every log and waits for all of them.
    ///
    /// All requests are issued before the first wait so the workers run in
    /// parallel; the call takes as long as the slowest log.
    pub fn flush_all(&self, force: bool) -> Vec<FlushReport> {
        let logs = self.all();
        let tickets: Vec<FlushTicket> = logs.iter().map(|log| log.request_flush(force)).collect();

        logs.iter()
            .zip(tickets)
            .map(|(log, ticket)| FlushReport {
                name: log.name(),
                table: log.table_name(),
                outcome: log.wait_flushed(ticket),
            })
            .collect()
    }

    /// Stops every flush thread first, then shuts every log down, so no log
    /// is still writing while its neighbours refuse records.
    pub fn shutdown_all(&self) {
        let logs = self.all();
        for log in &logs {
            log.stop_flush_thread();
        }
        for log in &logs {
            log.shutdown();
        }
    }

    pub fn stats(&self) -> Vec<LogStats> {
        self.all().iter().map(|log| log.stats()).collect()
    }
}
