//! Admission control for `execute` calls.
//!
//! The guard issues a monotonically increasing [`Ticket`] to every call.
//! After its debounce window a call is admitted only if its ticket is still
//! the latest one issued. An admitted call becomes the single active
//! operation, aborting whichever operation was active before it, and only
//! the active operation may commit its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use tracing::debug;

/// Generation number captured by one `execute` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

struct ActiveOperation {
    ticket: Ticket,
    handle: AbortHandle,
}

/// Debounce and cancel-the-previous bookkeeping for one store.
#[derive(Default)]
pub struct ExecutionGuard {
    latest: AtomicU64,
    active: Mutex<Option<ActiveOperation>>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new request, superseding every earlier ticket.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no request was issued after `ticket`.
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Ticket of the operation currently in flight, if any.
    pub fn active_ticket(&self) -> Option<Ticket> {
        self.lock().as_ref().map(|op| op.ticket)
    }

    /// Admit `ticket` if it is still the latest request.
    ///
    /// `start` runs under the guard lock and must launch the operation,
    /// returning its abort handle. The previously active operation is
    /// aborted before the new one is installed. Returns `false`, without
    /// calling `start`, when the ticket has been superseded.
    pub fn admit<F>(&self, ticket: Ticket, start: F) -> bool
    where
        F: FnOnce() -> AbortHandle,
    {
        let mut active = self.lock();
        if !self.is_latest(ticket) {
            return false;
        }

        let handle = start();
        if let Some(previous) = active.replace(ActiveOperation { ticket, handle }) {
            debug!(
                cancelled = previous.ticket.0,
                admitted = ticket.0,
                "cancelling in-flight operation"
            );
            previous.handle.abort();
        }
        true
    }

    /// Run `apply` if `ticket` is still the active operation.
    ///
    /// The operation stops being active either way. `apply` runs under the
    /// guard lock, so no admission can interleave with it. Returns `None`
    /// when the operation was cancelled or replaced.
    pub fn commit<R, F>(&self, ticket: Ticket, apply: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let mut active = self.lock();
        match active.as_ref() {
            Some(op) if op.ticket == ticket => {
                active.take();
                Some(apply())
            }
            _ => {
                debug!(ticket = ticket.0, "discarding stale completion");
                None
            }
        }
    }

    /// Supersede every pending request and abort the active operation.
    pub fn cancel_all(&self) {
        let mut active = self.lock();
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Some(op) = active.take() {
            debug!(cancelled = op.ticket.0, "cancelling in-flight operation");
            op.handle.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveOperation>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
