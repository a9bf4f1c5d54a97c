//! Debounced, cancelable execution of async producers.
//!
//! # Key Concepts
//!
//! - **Tickets**: every call captures a generation number at entry
//! - **Debounce**: after the delay only the latest ticket is admitted
//! - **Cancellation**: an admitted call aborts the previous in-flight task,
//!   and only the active ticket may commit a result

mod guard;
mod outcome;

pub use guard::{ExecutionGuard, Ticket};
pub use outcome::ExecuteOutcome;
