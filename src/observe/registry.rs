//! Per-segment observer callbacks and their disposers.

use crate::core::{Triple, TripleEvent};
use crate::observe::propagator::Propagator;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type StateCallback<S> = Arc<dyn Fn(&S) + Send + Sync>;
type LoadingCallback = Arc<dyn Fn(bool) + Send + Sync>;
type ErrorCallback<E> = Arc<dyn Fn(Option<&E>) + Send + Sync>;

/// Up to three callbacks, one per triple segment.
///
/// Each callback fires only for triples whose event tag names its
/// segment: `on_state` for [`TripleEvent::State`], `on_loading` for
/// [`TripleEvent::Loading`] and `on_error` for [`TripleEvent::Error`].
///
/// # Example
///
/// ```rust
/// use tristore::observe::Observer;
///
/// let observer: Observer<String, u32> = Observer::new()
///     .on_state(|count| println!("count is now {count}"))
///     .on_error(|error| println!("error: {error:?}"));
/// ```
pub struct Observer<E, S> {
    on_state: Option<StateCallback<S>>,
    on_loading: Option<LoadingCallback>,
    on_error: Option<ErrorCallback<E>>,
}

impl<E, S> Observer<E, S> {
    pub fn new() -> Self {
        Self {
            on_state: None,
            on_loading: None,
            on_error: None,
        }
    }

    pub fn on_state<F>(mut self, callback: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.on_state = Some(Arc::new(callback));
        self
    }

    pub fn on_loading<F>(mut self, callback: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_loading = Some(Arc::new(callback));
        self
    }

    /// Receives `None` when the error is cleared.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&E>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn dispatch(&self, triple: &Triple<E, S>) {
        match triple.event() {
            TripleEvent::State => {
                if let Some(callback) = &self.on_state {
                    callback(triple.state());
                }
            }
            TripleEvent::Loading => {
                if let Some(callback) = &self.on_loading {
                    callback(triple.is_loading());
                }
            }
            TripleEvent::Error => {
                if let Some(callback) = &self.on_error {
                    callback(triple.error());
                }
            }
        }
    }
}

impl<E, S> Default for Observer<E, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S> fmt::Debug for Observer<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("on_state", &self.on_state.is_some())
            .field("on_loading", &self.on_loading.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

struct Registration<E, S> {
    observer: Observer<E, S>,
    // Cleared by the disposer so a dispatch already in progress skips it.
    active: Arc<AtomicBool>,
}

/// Bookkeeping for the observers registered on one store.
pub struct ObserverRegistry<E, S> {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, Arc<Registration<E, S>>>>,
}

impl<E: Send + Sync + 'static, S: Send + Sync + 'static> ObserverRegistry<E, S> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register `observer` and return the disposer that removes it.
    pub fn register(self: &Arc<Self>, observer: Observer<E, S>) -> Disposer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.lock().insert(
            id,
            Arc::new(Registration {
                observer,
                active: Arc::clone(&active),
            }),
        );

        let registry: Weak<Self> = Arc::downgrade(self);
        Disposer::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(registry) = registry.upgrade() {
                registry.lock().remove(&id);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Registration<E, S>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Send + Sync + 'static, S: Send + Sync + 'static> Default for ObserverRegistry<E, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static, S: Send + Sync + 'static> Propagator<E, S>
    for ObserverRegistry<E, S>
{
    fn propagate(&self, triple: &Triple<E, S>) {
        // Callbacks run outside the lock so they may register or dispose.
        let mut snapshot: Vec<(u64, Arc<Registration<E, S>>)> = self
            .lock()
            .iter()
            .map(|(id, registration)| (*id, Arc::clone(registration)))
            .collect();
        snapshot.sort_unstable_by_key(|(id, _)| *id);

        for (_, registration) in snapshot {
            if registration.active.load(Ordering::SeqCst) {
                registration.observer.dispatch(triple);
            }
        }
    }

    fn close(&self) {
        let mut entries = self.lock();
        for registration in entries.values() {
            registration.active.store(false, Ordering::SeqCst);
        }
        entries.clear();
    }
}

/// Reverses one observer registration.
///
/// Dropping a disposer unregisters the observer just like
/// [`Disposer::dispose`]; bind it for as long as the callbacks should run.
#[must_use = "dropping the disposer unregisters the observer immediately"]
pub struct Disposer {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Disposer {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister every callback of the observer.
    ///
    /// No dispatch that starts after this returns will invoke them. A
    /// dispatch already running on another thread may still finish the call
    /// it is making. Disposing from inside one of the observer's own
    /// callbacks is allowed.
    pub async fn dispose(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("released", &self.release.is_none())
            .finish()
    }
}
