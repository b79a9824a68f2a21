//! Starting, stopping, and shutting down a log's flush worker.
//!
//! Lock order: the `worker` handle mutex may be held while taking the state
//! lock, never the other way round.

use std::sync::PoisonError;
use std::thread;

use sysevent_types::LogRecord;

use crate::log::SystemLog;
use crate::state::WorkerState;
use crate::worker;

impl<R: LogRecord> SystemLog<R> {
    /// Spawns the flush worker. Only valid from [`WorkerState::NotStarted`]
    /// on a log that is not shutting down; any other call is ignored.
    pub fn startup(&self) {
        let mut handle_slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let (previous, accepted) = {
            let mut state = self.shared.lock();
            let previous = state.worker_state;
            let accepted = previous == WorkerState::NotStarted && !state.is_shutdown;
            if accepted {
                state.worker_state = WorkerState::Running;
                state.worker_alive = true;
            }
            (previous, accepted)
        };
        if !accepted {
            tracing::debug!(
                log = R::name(),
                state = previous.as_str(),
                "ignoring startup of system log"
            );
            return;
        }

        let shared = self.shared.clone();
        let sink = self.sink.clone();
        let flush_interval = self.settings.flush_interval();
        let spawned = thread::Builder::new()
            .name(format!("syslog-{}", R::table_name()))
            .spawn(move || worker::run(shared, sink, flush_interval));

        match spawned {
            Ok(handle) => {
                *handle_slot = Some(handle);
                tracing::info!(
                    log = R::name(),
                    capacity = self.settings.capacity(),
                    flush_interval_ms = flush_interval.as_millis() as u64,
                    "started system log flush thread"
                );
            }
            Err(e) => {
                {
                    let mut state = self.shared.lock();
                    state.worker_state = WorkerState::NotStarted;
                    state.worker_alive = false;
                }
                self.shared.flush_event.notify_all();
                tracing::error!(log = R::name(), error = %e, "failed to spawn system log flush thread");
            }
        }
    }

    /// Stops the flush worker after its current cycle and waits for it to
    /// exit.
    ///
    /// The queue keeps accepting records, but nothing drains them until
    /// shutdown. Blocked flush callers are released.
    pub fn stop_flush_thread(&self) {
        {
            let mut state = self.shared.lock();
            if state.worker_state != WorkerState::Running || state.is_shutdown {
                return;
            }
            state.worker_state = WorkerState::StoppingThread;
            state.stop_requested = true;
        }
        self.shared.flush_event.notify_all();

        self.join_worker();
        self.wait_worker_exit();
        tracing::info!(log = R::name(), "stopped system log flush thread");
    }

    /// Stops accepting records, lets the worker make one last flush attempt,
    /// and releases every blocked flush caller. Idempotent.
    ///
    /// Returns only once no worker thread is left, even when a concurrent
    /// `stop_flush_thread` holds the join handle.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if state.is_shutdown {
                return;
            }
            state.is_shutdown = true;
            state.stop_requested = true;
        }
        self.shared.flush_event.notify_all();

        self.join_worker();
        self.wait_worker_exit();

        let dropped = {
            let mut state = self.shared.lock();
            state.worker_state = WorkerState::ShutDown;
            state.queue.len()
        };
        self.shared.flush_event.notify_all();

        if dropped > 0 {
            tracing::warn!(
                log = R::name(),
                dropped,
                "system log shut down with unflushed records"
            );
        } else {
            tracing::debug!(log = R::name(), "system log shut down");
        }
    }

    /// Joins the worker if this caller is the one to take its handle.
    fn join_worker(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!(log = R::name(), "system log flush thread panicked");
        }
    }

    /// Waits until the worker has cleared `worker_alive` on its way out.
    /// Returns at once on the worker thread itself.
    fn wait_worker_exit(&self) {
        let guard = self.shared.lock();
        if guard.worker_thread == Some(thread::current().id()) {
            return;
        }
        drop(
            self.shared
                .flush_event
                .wait_while(guard, |state| state.worker_alive)
                .unwrap_or_else(PoisonError::into_inner),
        );
    }
}
