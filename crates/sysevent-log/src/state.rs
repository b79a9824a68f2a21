//! State shared between producers, flush callers, and the flush worker.
//!
//! One mutex guards the queue and every watermark; one condition variable
//! (`flush_event`) carries all wake-ups in both directions. Waiters always
//! re-check their own predicate, so a single `notify_all` serves the worker
//! and every blocked flush caller at once.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use serde::Serialize;

use crate::queue::SequencedQueue;

/// Lifecycle of a log's flush worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Constructed; records are buffered but nothing drains them.
    NotStarted,
    /// The flush worker is running.
    Running,
    /// The flush worker was stopped; the queue still accepts records.
    StoppingThread,
    /// Terminal. New records are ignored and flushes return at once.
    ShutDown,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::StoppingThread => "stopping_thread",
            Self::ShutDown => "shut_down",
        }
    }
}

/// What a flush caller waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTicket {
    pub(crate) target: u64,
    /// Forced flushes also wait for the destination to be prepared.
    pub(crate) prepare: Option<u64>,
}

impl FlushTicket {
    /// Sequence number every record below which must be durable.
    pub fn target(&self) -> u64 {
        self.target
    }
}

/// Result of a blocking flush.
///
/// A flush returns early, without its target, when the worker was stopped or
/// the log shut down; `complete` tells the two cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushOutcome {
    pub target: u64,
    pub flushed_up_to: u64,
    pub complete: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub dropped_records: u64,
    pub overflow_episodes: u64,
    pub persisted_batches: u64,
    pub persisted_records: u64,
    pub failed_batches: u64,
    pub lost_records: u64,
}

pub(crate) struct LogState<R> {
    pub queue: SequencedQueue<R>,
    /// Highest target any caller (or the threshold trigger) asked for.
    pub requested_up_to: u64,
    /// Upper bound of the last drain; the worker sleeps while nothing beyond
    /// it was requested, so a failing sink does not spin.
    pub attempted_up_to: u64,
    /// Everything below this is durable (or was dropped). Never decreases.
    pub flushed_up_to: u64,
    /// Forced-preparation tickets issued, taken by the worker, and completed.
    pub prepare_requests: u64,
    pub prepare_attempted: u64,
    pub prepared_through: u64,
    pub worker_state: WorkerState,
    /// A worker thread exists and may still advance `flushed_up_to`. Set by
    /// `startup`, cleared only by the worker itself as it exits.
    pub worker_alive: bool,
    pub worker_thread: Option<ThreadId>,
    /// Tells the worker to finish its current cycle and exit. Never reset.
    pub stop_requested: bool,
    /// Set once by `shutdown`; `add` ignores records afterwards.
    pub is_shutdown: bool,
    pub counters: Counters,
}

impl<R> LogState<R> {
    fn new(capacity: usize, flush_threshold: usize) -> Self {
        Self {
            queue: SequencedQueue::new(capacity, flush_threshold),
            requested_up_to: 0,
            attempted_up_to: 0,
            flushed_up_to: 0,
            prepare_requests: 0,
            prepare_attempted: 0,
            prepared_through: 0,
            worker_state: WorkerState::NotStarted,
            worker_alive: false,
            worker_thread: None,
            stop_requested: false,
            is_shutdown: false,
            counters: Counters::default(),
        }
    }

    pub fn worker_has_work(&self) -> bool {
        self.stop_requested
            || self.is_shutdown
            || self.requested_up_to > self.attempted_up_to
            || self.prepare_requests > self.prepare_attempted
    }

    /// Whether a blocked flush caller can still be served. Before startup
    /// the caller waits for `startup` (or `shutdown`); once the worker is
    /// stopped for good nothing drains the queue until shutdown.
    pub fn flush_can_progress(&self) -> bool {
        self.worker_alive
            || (self.worker_state == WorkerState::NotStarted && !self.is_shutdown)
    }

    pub fn satisfies(&self, ticket: &FlushTicket) -> bool {
        self.flushed_up_to >= ticket.target
            && ticket
                .prepare
                .map_or(true, |prepare| self.prepared_through >= prepare)
    }
}

pub(crate) struct Shared<R> {
    state: Mutex<LogState<R>>,
    pub flush_event: Condvar,
}

impl<R> Shared<R> {
    pub fn new(capacity: usize, flush_threshold: usize) -> Self {
        Self {
            state: Mutex::new(LogState::new(capacity, flush_threshold)),
            flush_event: Condvar::new(),
        }
    }

    /// Locks the shared state. A panic on another thread while holding the
    /// lock leaves the counters consistent, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, LogState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
