//! Build errors for the store builder.

use thiserror::Error;

/// Errors that can occur when building a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Stream capacity must be greater than zero")]
    ZeroStreamCapacity,

    #[error("Stream capacity {found} exceeds the maximum of {max}")]
    StreamCapacityTooLarge { found: usize, max: usize },
}
