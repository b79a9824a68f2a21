//! The producer-facing system log.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde::Serialize;
use sysevent_db::DbPool;
use sysevent_types::LogRecord;

use crate::error::SinkError;
use crate::queue::Admission;
use crate::settings::LogSettings;
use crate::sink::{LogSink, PersistedRow, SqliteSink};
use crate::state::{Shared, WorkerState};

/// An asynchronous, bounded log of one record schema.
///
/// Producers call [`SystemLog::add`], which only appends to an in-memory
/// queue. A dedicated flush thread (started by [`SystemLog::startup`])
/// drains the queue and hands batches to the sink. Records may be lost on
/// overflow or sink failure; callers that need durability use
/// [`SystemLog::flush`] and inspect the returned outcome.
pub struct SystemLog<R: LogRecord> {
    pub(crate) shared: Arc<Shared<R>>,
    pub(crate) sink: Arc<dyn LogSink<R>>,
    pub(crate) settings: LogSettings,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

/// Point-in-time view of a log's queue, watermarks, and counters.
#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub name: &'static str,
    pub table: &'static str,
    pub state: WorkerState,
    pub buffered: usize,
    pub capacity: usize,
    pub front_index: u64,
    pub next_sequence: u64,
    pub requested_up_to: u64,
    pub attempted_up_to: u64,
    pub flushed_up_to: u64,
    pub dropped_records: u64,
    /// Equals the number of overflow diagnostics emitted.
    pub overflow_episodes: u64,
    pub persisted_batches: u64,
    pub persisted_records: u64,
    pub failed_batches: u64,
    pub lost_records: u64,
}

impl<R: LogRecord> SystemLog<R> {
    /// Creates a log in [`WorkerState::NotStarted`] writing to `sink`.
    pub fn new(sink: Arc<dyn LogSink<R>>, settings: LogSettings) -> Self {
        Self {
            shared: Arc::new(Shared::new(
                settings.capacity(),
                settings.flush_threshold(),
            )),
            sink,
            settings,
            worker: Mutex::new(None),
        }
    }

    /// Creates a log persisting to the schema's SQLite table.
    pub fn with_sqlite(pool: DbPool, settings: LogSettings) -> Self {
        Self::new(Arc::new(SqliteSink::<R>::new(pool)), settings)
    }

    pub fn name(&self) -> &'static str {
        R::name()
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Appends a record.
    ///
    /// Never blocks on storage and never fails: when the queue is full the
    /// record is discarded and a single diagnostic is issued for the whole
    /// overflow episode. After shutdown the call does nothing.
    pub fn add(&self, record: R) {
        let admission = {
            let mut state = self.shared.lock();
            if state.is_shutdown {
                return;
            }

            let admission = state.queue.push(record);
            match admission {
                Admission::Buffered {
                    threshold_reached: true,
                    ..
                } => {
                    let target = state.queue.next_sequence();
                    state.requested_up_to = state.requested_up_to.max(target);
                }
                Admission::Dropped {
                    first_in_episode, ..
                } => {
                    state.counters.dropped_records += 1;
                    if first_in_episode {
                        state.counters.overflow_episodes += 1;
                    }
                }
                Admission::Buffered { .. } => {}
            }
            admission
        };

        // Diagnostics go out after the lock is released: a tracing layer may
        // itself append to a system log.
        match admission {
            Admission::Buffered {
                threshold_reached: true,
                sequence,
            } => {
                self.shared.flush_event.notify_all();
                tracing::info!(
                    log = R::name(),
                    threshold = self.settings.flush_threshold(),
                    sequence,
                    "system log queue reached flush threshold, requesting flush"
                );
            }
            Admission::Dropped {
                front_index,
                first_in_episode: true,
                ..
            } => {
                tracing::error!(
                    log = R::name(),
                    front_index,
                    capacity = self.settings.capacity(),
                    "system log queue is full, dropping records until the next flush"
                );
            }
            _ => {}
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.shared.lock().worker_state
    }

    /// Everything below this sequence number is durable (or was dropped).
    pub fn flushed_up_to(&self) -> u64 {
        self.shared.lock().flushed_up_to
    }

    pub fn stats(&self) -> LogStats {
        let state = self.shared.lock();
        LogStats {
            name: R::name(),
            table: R::table_name(),
            state: state.worker_state,
            buffered: state.queue.len(),
            capacity: state.queue.capacity(),
            front_index: state.queue.front_index(),
            next_sequence: state.queue.next_sequence(),
            requested_up_to: state.requested_up_to,
            attempted_up_to: state.attempted_up_to,
            flushed_up_to: state.flushed_up_to,
            dropped_records: state.counters.dropped_records,
            overflow_episodes: state.counters.overflow_episodes,
            persisted_batches: state.counters.persisted_batches,
            persisted_records: state.counters.persisted_records,
            failed_batches: state.counters.failed_batches,
            lost_records: state.counters.lost_records,
        }
    }

    /// Reads back recently persisted records from the sink.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<PersistedRow>, SinkError> {
        self.sink.query_recent(limit)
    }
}

impl<R: LogRecord> Drop for SystemLog<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
