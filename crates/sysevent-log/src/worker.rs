//! The flush worker loop.
//!
//! One cycle: wait (idle) → drain a snapshot of the queue → persist it
//! without holding the lock → publish the new watermark and broadcast. The
//! worker exits after the cycle in which it observes `stop_requested` or
//! `is_shutdown`, so a stop or shutdown always gets one last drain. On the
//! way out it clears `worker_alive` itself, even when unwinding.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Duration;

use sysevent_types::LogRecord;

use crate::error::SinkError;
use crate::sink::LogSink;
use crate::state::Shared;

/// Work taken out of the shared state for one cycle.
struct Cycle<R> {
    records: Vec<R>,
    upper_bound: u64,
    /// Last forced-preparation ticket this cycle answers for.
    prepare_ticket: u64,
    forced_prepare: bool,
    exit: bool,
}

/// Marks the worker gone when `run` returns or unwinds.
struct ExitGuard<'a, R> {
    shared: &'a Shared<R>,
}

impl<R> Drop for ExitGuard<'_, R> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.worker_alive = false;
            state.worker_thread = None;
        }
        self.shared.flush_event.notify_all();
    }
}

pub(crate) fn run<R: LogRecord>(
    shared: Arc<Shared<R>>,
    sink: Arc<dyn LogSink<R>>,
    flush_interval: Duration,
) {
    let log = R::name();
    shared.lock().worker_thread = Some(thread::current().id());
    let _exit = ExitGuard { shared: &shared };

    let mut prepared = match guarded(|| sink.ensure_destination_exists()) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(log, error = %e, "failed to prepare system log destination");
            false
        }
    };

    loop {
        let cycle = next_cycle(&shared, flush_interval);
        let needs_prepare = !prepared || cycle.forced_prepare;

        if cycle.records.is_empty() && !needs_prepare {
            if cycle.exit {
                break;
            }
            continue;
        }

        let count = cycle.records.len();
        let result = guarded(|| {
            if needs_prepare {
                sink.ensure_destination_exists()?;
            }
            sink.persist_batch(&cycle.records)
        });
        drop(cycle.records);

        {
            let mut state = shared.lock();
            match result {
                Ok(()) => {
                    state.flushed_up_to = state.flushed_up_to.max(cycle.upper_bound);
                    state.prepared_through = state.prepared_through.max(cycle.prepare_ticket);
                    if count > 0 {
                        state.counters.persisted_batches += 1;
                        state.counters.persisted_records += count as u64;
                    }
                }
                Err(_) => {
                    state.counters.failed_batches += 1;
                    state.counters.lost_records += count as u64;
                }
            }
        }
        shared.flush_event.notify_all();

        match &result {
            Ok(()) => {
                prepared = true;
                tracing::trace!(
                    log,
                    count,
                    upper_bound = cycle.upper_bound,
                    "flushed system log batch"
                );
            }
            Err(e) => {
                if needs_prepare {
                    prepared = false;
                }
                tracing::error!(
                    log,
                    count,
                    upper_bound = cycle.upper_bound,
                    error = %e,
                    "failed to flush system log batch, records are lost"
                );
            }
        }

        if cycle.exit {
            break;
        }
    }

    tracing::debug!(log, "system log flush thread exiting");
}

/// Sleeps until there is work (or the flush interval passes) and takes it.
fn next_cycle<R>(shared: &Shared<R>, flush_interval: Duration) -> Cycle<R> {
    let guard = shared.lock();
    let (mut state, _) = shared
        .flush_event
        .wait_timeout_while(guard, flush_interval, |state| !state.worker_has_work())
        .unwrap_or_else(PoisonError::into_inner);

    let drained = state.queue.drain();
    state.attempted_up_to = state.attempted_up_to.max(drained.upper_bound);

    let forced_prepare = state.prepare_requests > state.prepare_attempted;
    state.prepare_attempted = state.prepare_requests;

    Cycle {
        records: drained.records,
        upper_bound: drained.upper_bound,
        prepare_ticket: state.prepare_requests,
        forced_prepare,
        exit: state.stop_requested || state.is_shutdown,
    }
}

/// Runs a sink call, turning a panic into an ordinary failure so a broken
/// sink cannot take the worker (and every waiting flush caller) down.
fn guarded<F>(call: F) -> Result<(), SinkError>
where
    F: FnOnce() -> Result<(), SinkError>,
{
    panic::catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|_| Err(SinkError::Unavailable("sink panicked".to_string())))
}
