//! Flush requests: the synchronisation contract between callers and the
//! flush worker.
//!
//! A request captures the next sequence number as its target and raises
//! `requested_up_to` to it. The worker wakes whenever something beyond its
//! last drain was requested, persists, advances `flushed_up_to`, and
//! broadcasts. Concurrent callers are all served by the first cycle that
//! passes the highest of their targets.

use std::sync::PoisonError;

use sysevent_types::LogRecord;

use crate::log::SystemLog;
use crate::state::{FlushOutcome, FlushTicket};

impl<R: LogRecord> SystemLog<R> {
    /// Asks the worker to persist everything submitted so far and returns the
    /// target sequence number without waiting.
    ///
    /// `force` additionally makes the worker (re)prepare the destination even
    /// if nothing is buffered.
    pub fn notify_flush(&self, force: bool) -> u64 {
        self.request_flush(force).target()
    }

    /// Like [`SystemLog::notify_flush`], returning a ticket for
    /// [`SystemLog::wait_flushed`].
    pub fn request_flush(&self, force: bool) -> FlushTicket {
        let ticket = {
            let mut state = self.shared.lock();
            let target = state.queue.next_sequence();
            if state.is_shutdown {
                return FlushTicket {
                    target,
                    prepare: None,
                };
            }

            state.requested_up_to = state.requested_up_to.max(target);
            let prepare = force.then(|| {
                state.prepare_requests += 1;
                state.prepare_requests
            });
            FlushTicket { target, prepare }
        };

        self.shared.flush_event.notify_all();
        tracing::trace!(
            log = R::name(),
            target = ticket.target,
            force,
            "system log flush requested"
        );
        ticket
    }

    /// Blocks until the ticket is satisfied or no worker is left to satisfy
    /// it. A caller that arrives before `startup` keeps waiting for the
    /// worker; one that arrives after `stop_flush_thread` or `shutdown`
    /// returns at once.
    pub fn wait_flushed(&self, ticket: FlushTicket) -> FlushOutcome {
        let guard = self.shared.lock();
        let state = self
            .shared
            .flush_event
            .wait_while(guard, |state| {
                !state.satisfies(&ticket) && state.flush_can_progress()
            })
            .unwrap_or_else(PoisonError::into_inner);

        FlushOutcome {
            target: ticket.target,
            flushed_up_to: state.flushed_up_to,
            complete: state.satisfies(&ticket),
        }
    }

    /// Persists everything submitted so far and waits for it.
    ///
    /// Returns early with `complete == false` if the log shuts down (or its
    /// worker was stopped) before the target is reached.
    pub fn flush(&self, force: bool) -> FlushOutcome {
        let ticket = self.request_flush(force);
        self.wait_flushed(ticket)
    }
}
