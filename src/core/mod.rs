//! Value types of the store.
//!
//! This module contains the pure data the store is built from:
//! - The `StoreValue` bound shared by state and error types
//! - The immutable `Triple` and its `TripleEvent` tag
//! - The `Either` result consumed by `execute_either`
//!
//! Nothing in this module performs I/O, spawns tasks or notifies anyone.

mod either;
mod triple;
mod value;

pub use either::Either;
pub use triple::{Triple, TripleEvent, TriplePatch};
pub use value::StoreValue;
