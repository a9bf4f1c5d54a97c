//! Propagation strategies for accepted triples.

use crate::core::{StoreValue, Triple};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Receives every triple a store accepts.
///
/// A store calls [`Propagator::propagate`] exactly once per accepted
/// mutation, with the triple that was just installed, and calls
/// [`Propagator::close`] once when it is destroyed. Implementations must
/// not block: they run inline with the mutation that produced the triple.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tristore::core::Triple;
/// use tristore::observe::Propagator;
/// use tristore::store::Store;
///
/// #[derive(Default)]
/// struct CountingPropagator(AtomicUsize);
///
/// impl Propagator<String, u32> for CountingPropagator {
///     fn propagate(&self, _triple: &Triple<String, u32>) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(CountingPropagator::default());
/// let store = Store::<String, u32>::builder(0)
///     .propagator(counter.clone())
///     .build()
///     .unwrap();
///
/// store.update(1);
/// store.update(1);
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait Propagator<E, S>: Send + Sync {
    /// Deliver a freshly accepted triple.
    fn propagate(&self, triple: &Triple<E, S>);

    /// Stop delivering. Called once from `Store::destroy`.
    fn close(&self) {}
}

/// Multicasts accepted triples over a tokio broadcast channel.
///
/// Slow receivers lag (and skip old triples) instead of holding back the
/// store.
pub struct BroadcastPropagator<E, S> {
    sender: Mutex<Option<broadcast::Sender<Triple<E, S>>>>,
}

impl<E: StoreValue, S: StoreValue> BroadcastPropagator<E, S> {
    /// `capacity` must lie in `1..=MAX_STREAM_CAPACITY`; `StoreBuilder`
    /// validates it before a store is built.
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Receive every triple propagated from now on.
    ///
    /// After [`Propagator::close`] the returned receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Triple<E, S>> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl<E: StoreValue, S: StoreValue> Propagator<E, S> for BroadcastPropagator<E, S> {
    fn propagate(&self, triple: &Triple<E, S>) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No receivers is not an error.
            let _ = sender.send(triple.clone());
        }
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
