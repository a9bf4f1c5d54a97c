//! Builder for constructing stores.

use crate::core::StoreValue;
use crate::observe::Propagator;
use crate::store::config::{StoreConfig, MAX_STREAM_CAPACITY};
use crate::store::error::BuildError;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing stores with a fluent API.
pub struct StoreBuilder<E, S> {
    initial: S,
    config: StoreConfig,
    propagators: Vec<Arc<dyn Propagator<E, S>>>,
}

impl<E: StoreValue, S: StoreValue> StoreBuilder<E, S> {
    /// Create a builder holding the initial state.
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            config: StoreConfig::default(),
            propagators: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the debounce window used by `execute` and `execute_either`.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.config.debounce = delay;
        self
    }

    /// Set the buffer size of the triple stream.
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.stream_capacity = capacity;
        self
    }

    /// Add a propagator that receives every accepted triple after the
    /// built-in observers and stream.
    pub fn propagator(mut self, propagator: Arc<dyn Propagator<E, S>>) -> Self {
        self.propagators.push(propagator);
        self
    }

    /// Build the store.
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Store<E, S>, BuildError> {
        match self.config.stream_capacity {
            0 => return Err(BuildError::ZeroStreamCapacity),
            found if found > MAX_STREAM_CAPACITY => {
                return Err(BuildError::StreamCapacityTooLarge {
                    found,
                    max: MAX_STREAM_CAPACITY,
                })
            }
            _ => {}
        }

        Ok(Store::from_parts(
            self.initial,
            self.config,
            self.propagators,
        ))
    }
}
