//! Delivery of accepted triples to the outside world.
//!
//! A store hands every triple it accepts to a list of [`Propagator`]s:
//! - [`ObserverRegistry`] dispatches to per-segment [`Observer`] callbacks
//! - a broadcast propagator multicasts whole triples over a tokio channel
//!   (`Store::subscribe`)
//! - user propagators plug in through `StoreBuilder::propagator`

mod propagator;
mod registry;

pub(crate) use propagator::BroadcastPropagator;
pub use propagator::Propagator;
pub use registry::{Disposer, Observer, ObserverRegistry};
