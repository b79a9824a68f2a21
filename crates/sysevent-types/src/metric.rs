//! Metric, profiling, and tracing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Periodic snapshot of profile events and current metrics (`metric_log`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricLog {
    pub event_time: DateTime<Utc>,
    pub milliseconds: u64,
    /// Increments of cumulative counters since the previous snapshot.
    pub profile_events: BTreeMap<String, u64>,
    /// Point-in-time gauge values.
    pub current_metrics: BTreeMap<String, i64>,
}

crate::log_record!(MetricLog, "MetricLog", "metric_log");

/// One asynchronously computed metric value (`asynchronous_metric_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsynchronousMetricLog {
    pub event_time: DateTime<Utc>,
    pub metric: String,
    pub value: f64,
}

crate::log_record!(
    AsynchronousMetricLog,
    "AsynchronousMetricLog",
    "asynchronous_metric_log"
);

/// What triggered a stack sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceKind {
    Real,
    Cpu,
    Memory,
    MemorySample,
    MemoryPeak,
}

/// Sampled stack trace (`trace_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceLog {
    pub event_time: DateTime<Utc>,
    pub timestamp_ns: u64,
    pub trace_kind: TraceKind,
    pub thread_id: u64,
    pub query_id: String,
    /// Return addresses, innermost first.
    pub trace: Vec<u64>,
    /// Allocation size for the memory kinds, zero otherwise.
    pub size: i64,
}

crate::log_record!(TraceLog, "TraceLog", "trace_log");

/// Fatal signal report written by the crash handler (`crash_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashLog {
    pub event_time: DateTime<Utc>,
    pub timestamp_ns: u64,
    pub signal: i32,
    pub thread_id: u64,
    pub query_id: String,
    pub trace: Vec<u64>,
    pub trace_full: Vec<String>,
    pub version: String,
    pub revision: u32,
    pub build_id: String,
}

crate::log_record!(CrashLog, "CrashLog", "crash_log");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// A finished OpenTelemetry span (`opentelemetry_span_log`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetrySpanLog {
    pub event_time: DateTime<Utc>,
    pub trace_id: uuid::Uuid,
    pub span_id: u64,
    pub parent_span_id: u64,
    pub operation_name: String,
    pub kind: SpanKind,
    pub start_time_us: u64,
    pub finish_time_us: u64,
    pub attributes: BTreeMap<String, String>,
}

crate::log_record!(
    OpenTelemetrySpanLog,
    "OpenTelemetrySpanLog",
    "opentelemetry_span_log"
);
