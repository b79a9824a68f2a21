//! Asynchronous system logs.
//!
//! Query threads and background services record structured events by
//! calling [`SystemLog::add`], which appends to a bounded in-memory queue and
//! returns immediately. Each log owns one flush thread that drains the queue
//! in batches and hands them to a [`LogSink`] (SQLite by default).
//!
//! # Guarantees
//!
//! - `add` never blocks on storage and never fails. A full queue drops the
//!   newest record and reports the overflow once per episode.
//! - Every offered record receives a global sequence number, dropped or not.
//!   [`SystemLog::flush`] waits until everything below the number current at
//!   call time is durable. Concurrent flushes share worker cycles.
//! - Sink failures are logged and the batch is discarded; there is no retry.
//! - [`SystemLog::shutdown`] is idempotent, stops accepting records, makes one
//!   final flush attempt, and releases every blocked flush caller.
//!
//! Delivery is best effort. There is no ordering across different logs.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sysevent_log::{LogSettings, SystemLogs};
//!
//! let logs = SystemLogs::new(&pool, LogSettings::default(), &[]);
//! logs.startup_all();
//!
//! if let Some(query_log) = &logs.query_log {
//!     query_log.add(record);
//! }
//!
//! // SYSTEM FLUSH LOGS
//! for report in logs.flush_all(true) {
//!     assert!(report.outcome.complete);
//! }
//!
//! logs.shutdown_all();
//! ```

mod error;
mod flush;
mod lifecycle;
mod log;
mod queue;
mod registry;
mod settings;
mod sink;
mod state;
mod worker;

pub use error::SinkError;
pub use log::{LogStats, SystemLog};
pub use queue::{Admission, Drained, SequencedQueue};
pub use registry::{FlushReport, SystemLogHandle, SystemLogs};
pub use settings::{LogSettings, DEFAULT_CAPACITY, DEFAULT_FLUSH_INTERVAL};
pub use sink::{LogSink, PersistedRow, SqliteSink};
pub use state::{FlushOutcome, FlushTicket, WorkerState};
