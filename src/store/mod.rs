//! The reactive triple store.
//!
//! A [`Store`] owns one current [`Triple`], mutates it only through a
//! change-detecting protocol, and runs async producers through the
//! debounce/cancel pipeline of [`crate::execution`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tristore::store::Store;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store: Store<String, Vec<String>> = Store::new(Vec::new());
//!
//! let outcome = store
//!     .execute_with_delay(
//!         || async { Ok(vec!["alpha".to_string()]) },
//!         Duration::ZERO,
//!     )
//!     .await;
//!
//! assert!(outcome.is_applied());
//! assert_eq!(store.state(), vec!["alpha".to_string()]);
//! assert!(!store.is_loading());
//! # }
//! ```

mod builder;
mod config;
mod error;

pub use builder::StoreBuilder;
pub use config::{StoreConfig, DEFAULT_DEBOUNCE, DEFAULT_STREAM_CAPACITY, MAX_STREAM_CAPACITY};
pub use error::BuildError;

use crate::core::{Either, StoreValue, Triple, TripleEvent};
use crate::execution::{ExecuteOutcome, ExecutionGuard};
use crate::observe::{BroadcastPropagator, Disposer, Observer, ObserverRegistry, Propagator};
use futures::FutureExt;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

struct Slots<E, S> {
    current: Arc<Triple<E, S>>,
    last: Arc<Triple<E, S>>,
    // Installed but not yet delivered, in install order.
    pending: VecDeque<Arc<Triple<E, S>>>,
    draining: bool,
    destroyed: bool,
}

/// Clears the draining flag if a propagator panics mid-delivery.
struct DrainReset<'a, E, S>(&'a Mutex<Slots<E, S>>);

impl<E, S> Drop for DrainReset<'_, E, S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            slots.draining = false;
        }
    }
}

struct Inner<E, S> {
    slots: Mutex<Slots<E, S>>,
    guard: ExecutionGuard,
    observers: Arc<ObserverRegistry<E, S>>,
    stream: Arc<BroadcastPropagator<E, S>>,
    // Registry first, then the stream, then user propagators.
    propagators: Vec<Arc<dyn Propagator<E, S>>>,
    config: StoreConfig,
}

/// Reactive holder of a state/loading/error [`Triple`].
///
/// Cloning a store yields another handle to the same cell.
pub struct Store<E, S> {
    inner: Arc<Inner<E, S>>,
}

impl<E: StoreValue, S: StoreValue> Store<E, S> {
    /// Create a store with the default configuration.
    pub fn new(initial: S) -> Self {
        Self::from_parts(initial, StoreConfig::default(), Vec::new())
    }

    pub fn builder(initial: S) -> StoreBuilder<E, S> {
        StoreBuilder::new(initial)
    }

    pub(crate) fn from_parts(
        initial: S,
        config: StoreConfig,
        extra: Vec<Arc<dyn Propagator<E, S>>>,
    ) -> Self {
        let triple = Arc::new(Triple::new(initial));
        let observers = Arc::new(ObserverRegistry::new());
        let stream = Arc::new(BroadcastPropagator::new(config.stream_capacity));

        let mut propagators: Vec<Arc<dyn Propagator<E, S>>> = Vec::with_capacity(2 + extra.len());
        propagators.push(observers.clone());
        propagators.push(stream.clone());
        propagators.extend(extra);

        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(Slots {
                    current: Arc::clone(&triple),
                    last: triple,
                    pending: VecDeque::new(),
                    draining: false,
                    destroyed: false,
                }),
                guard: ExecutionGuard::new(),
                observers,
                stream,
                propagators,
                config,
            }),
        }
    }

    /// Snapshot of the current triple.
    pub fn triple(&self) -> Arc<Triple<E, S>> {
        Arc::clone(&self.lock().current)
    }

    /// The triple replaced by the most recent accepted mutation.
    ///
    /// Equal to [`Store::triple`] until the first mutation is accepted.
    pub fn last_triple(&self) -> Arc<Triple<E, S>> {
        Arc::clone(&self.lock().last)
    }

    pub fn state(&self) -> S {
        self.triple().state().clone()
    }

    /// Read the current state without cloning it.
    pub fn select<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.triple().state())
    }

    pub fn is_loading(&self) -> bool {
        self.triple().is_loading()
    }

    pub fn error(&self) -> Option<E> {
        self.triple().error().cloned()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Replace the state. Returns whether the change was accepted.
    pub fn update(&self, state: S) -> bool {
        self.mutate(TripleEvent::State, |current| current.with_state(state))
    }

    /// Replace the loading flag. Returns whether the change was accepted.
    pub fn set_loading(&self, is_loading: bool) -> bool {
        self.mutate(TripleEvent::Loading, |current| {
            current.with_loading(is_loading)
        })
    }

    /// Replace the error. The loading flag is left as it is.
    pub fn set_error(&self, error: E) -> bool {
        self.mutate(TripleEvent::Error, |current| current.with_error(error))
    }

    pub fn clear_error(&self) -> bool {
        self.mutate(TripleEvent::Error, |current| current.without_error())
    }

    /// Build a candidate from the current triple and accept it only if it
    /// differs both as a whole and in the segment named by `event`.
    fn mutate<F>(&self, event: TripleEvent, build: F) -> bool
    where
        F: FnOnce(&Triple<E, S>) -> Triple<E, S>,
    {
        let slots = self.lock();
        if slots.destroyed {
            warn!(?event, "ignoring mutation of a destroyed store");
            return false;
        }

        let candidate = build(slots.current.as_ref());
        if candidate == *slots.current || !slots.current.segment_differs(&candidate, event) {
            debug!(?event, "mutation rejected: no change");
            return false;
        }

        self.propagate(slots, candidate);
        true
    }

    /// Install `triple` as the current triple and hand it to every
    /// propagator.
    ///
    /// Called exactly once per accepted mutation. Triples are delivered in
    /// install order: if another call (on another thread, or further up
    /// this stack inside a callback) is already delivering, the triple is
    /// queued for that call instead. The slots lock is not held during
    /// delivery, so propagators may read or mutate the store.
    fn propagate(&self, mut slots: MutexGuard<'_, Slots<E, S>>, triple: Triple<E, S>) {
        let installed = Arc::new(triple);
        slots.last = std::mem::replace(&mut slots.current, Arc::clone(&installed));
        slots.pending.push_back(installed);
        if slots.draining {
            return;
        }
        slots.draining = true;
        drop(slots);

        self.drain();
    }

    fn drain(&self) {
        let _reset = DrainReset(&self.inner.slots);
        loop {
            let next = {
                let mut slots = self.lock();
                match slots.pending.pop_front() {
                    Some(triple) if !slots.destroyed => triple,
                    _ => {
                        slots.pending.clear();
                        slots.draining = false;
                        return;
                    }
                }
            };

            trace!(event = ?next.event(), triple = ?next, "propagating triple");
            for propagator in &self.inner.propagators {
                propagator.propagate(&next);
            }
        }
    }

    /// Register per-segment callbacks. Returns the disposer that removes
    /// them.
    pub fn observer(&self, observer: Observer<E, S>) -> Disposer {
        if self.is_destroyed() {
            warn!("observer registered on a destroyed store is never called");
            return Disposer::new(|| {});
        }
        self.inner.observers.register(observer)
    }

    /// Stream of every triple accepted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Triple<E, S>> {
        self.inner.stream.subscribe()
    }

    /// Number of live [`Store::subscribe`] receivers. Zero once destroyed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.stream.receiver_count()
    }

    /// Run `producer` after the configured debounce window.
    ///
    /// See [`Store::execute_with_delay`].
    pub async fn execute<F, Fut>(&self, producer: F) -> ExecuteOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
    {
        self.execute_with_delay(producer, self.inner.config.debounce)
            .await
    }

    /// Run `producer` once `delay` passes without a newer `execute` call.
    ///
    /// A superseded call returns without touching the store. An admitted
    /// call sets loading, cancels any producer still in flight, then folds
    /// the result: `Ok` into the state, `Err` into the error, and finally
    /// clears loading. A cancelled producer never changes the store.
    pub async fn execute_with_delay<F, Fut>(&self, producer: F, delay: Duration) -> ExecuteOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
    {
        self.run(producer, delay).await
    }

    /// [`Store::execute`] for producers returning [`Either`].
    pub async fn execute_either<F, Fut>(&self, producer: F) -> ExecuteOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Either<E, S>> + Send + 'static,
    {
        self.execute_either_with_delay(producer, self.inner.config.debounce)
            .await
    }

    /// [`Store::execute_with_delay`] for producers returning [`Either`].
    ///
    /// `Left` routes to the error, `Right` to the state.
    pub async fn execute_either_with_delay<F, Fut>(
        &self,
        producer: F,
        delay: Duration,
    ) -> ExecuteOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Either<E, S>> + Send + 'static,
    {
        let producer = move || {
            let either = producer();
            async move { either.await.into_result() }
        };
        self.run(producer, delay).await
    }

    async fn run<F, Fut>(&self, producer: F, delay: Duration) -> ExecuteOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
    {
        if self.is_destroyed() {
            return ExecuteOutcome::Destroyed;
        }

        let guard = &self.inner.guard;
        let ticket = guard.issue();
        tokio::time::sleep(delay).await;

        if self.is_destroyed() {
            return ExecuteOutcome::Destroyed;
        }

        let mut task = None;
        let admitted = guard.admit(ticket, || {
            self.set_loading(true);
            let store = self.clone();
            let work = producer();
            let handle = tokio::spawn(async move {
                match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(result) => store
                        .inner
                        .guard
                        .commit(ticket, || store.fold(result))
                        .unwrap_or(ExecuteOutcome::Cancelled),
                    Err(_) => {
                        error!(
                            ticket = ticket.generation(),
                            "producer panicked; result discarded"
                        );
                        store
                            .inner
                            .guard
                            .commit(ticket, || store.set_loading(false));
                        ExecuteOutcome::Panicked
                    }
                }
            });
            let abort = handle.abort_handle();
            task = Some(handle);
            abort
        });

        let Some(task) = task.filter(|_| admitted) else {
            debug!(ticket = ticket.generation(), "execute superseded during debounce");
            return ExecuteOutcome::Superseded;
        };
        debug!(ticket = ticket.generation(), "execute admitted");

        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) if join_error.is_cancelled() => ExecuteOutcome::Cancelled,
            Err(join_error) => {
                // The producer's own panics are caught in the task; this is
                // a propagator panicking while the result was folded.
                error!(
                    ticket = ticket.generation(),
                    error = %join_error,
                    "execution task panicked"
                );
                ExecuteOutcome::Panicked
            }
        }
    }

    fn fold(&self, result: Result<S, E>) -> ExecuteOutcome {
        match result {
            Ok(state) => {
                self.update(state);
                self.set_loading(false);
                ExecuteOutcome::Committed
            }
            Err(error) => {
                self.set_error(error);
                self.set_loading(false);
                ExecuteOutcome::Failed
            }
        }
    }

    /// Tear the store down.
    ///
    /// Cancels the in-flight producer, supersedes pending `execute` calls
    /// and detaches every observer and stream. Later mutations are ignored.
    /// Calling it again does nothing.
    pub async fn destroy(&self) {
        {
            let mut slots = self.lock();
            if slots.destroyed {
                return;
            }
            slots.destroyed = true;
        }

        self.inner.guard.cancel_all();
        for propagator in &self.inner.propagators {
            propagator.close();
        }
        debug!("store destroyed");
    }

    fn lock(&self) -> MutexGuard<'_, Slots<E, S>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E, S> Clone for Store<E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: StoreValue, S: StoreValue> fmt::Debug for Store<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("triple", &self.triple())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
