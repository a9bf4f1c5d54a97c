//! Tristore: a reactive state/loading/error cell
//!
//! Tristore holds a single immutable [`Triple`] of state, loading flag and
//! error. Mutations only propagate when they change something, and async
//! work runs through a debounced, cancelable pipeline so a stale producer
//! can never overwrite a newer result.
//!
//! # Core Concepts
//!
//! - **Triple**: immutable value tagged with the segment that last changed
//! - **Store**: owns the current triple and the change-detecting mutators
//! - **Execution**: debounce by generation ticket, cancel the previous task
//! - **Observation**: per-segment callbacks, broadcast streams, custom propagators
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tristore::{Observer, Store};
//!
//! let store: Store<String, u32> = Store::new(0);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let _disposer = store.observer(Observer::new().on_state(move |count: &u32| {
//!     sink.lock().unwrap().push(*count);
//! }));
//!
//! store.update(1);
//! store.update(1); // no change, no notification
//! store.set_loading(true); // loading segment, not observed
//! store.update(2);
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! ```

pub mod core;
pub mod execution;
pub mod observe;
pub mod store;

// Re-export commonly used types
pub use crate::core::{Either, StoreValue, Triple, TripleEvent};
pub use crate::execution::ExecuteOutcome;
pub use crate::observe::{Disposer, Observer, Propagator};
pub use crate::store::{BuildError, Store, StoreBuilder, StoreConfig};
