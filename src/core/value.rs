//! Bound shared by every state and error type held in a store.
//!
//! Stores clone values into new triples, compare them for change
//! detection, and move them across tokio tasks, so both type parameters
//! of a store carry the same set of requirements.

use std::fmt::Debug;

/// Marker trait for values a store can hold as state or error.
///
/// Implemented automatically for every type that satisfies the bounds.
///
/// # Required Traits
///
/// - `Clone`: each accepted mutation builds a fresh triple from the old one
/// - `PartialEq`: change detection compares the candidate with the current value
/// - `Debug`: values show up in trace logs
/// - `Send + Sync + 'static`: producers run on spawned tasks
///
/// # Example
///
/// ```rust
/// use tristore::core::StoreValue;
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Cart {
///     items: Vec<String>,
/// }
///
/// fn assert_store_value<T: StoreValue>() {}
/// assert_store_value::<Cart>();
/// assert_store_value::<String>();
/// ```
pub trait StoreValue: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}
