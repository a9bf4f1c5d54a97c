//! What happened to one `execute` call.

use serde::{Deserialize, Serialize};

/// Result of a single `execute`/`execute_either` call.
///
/// Informational only: state, errors and loading are always reported
/// through the store's triple, never through this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteOutcome {
    /// A newer call arrived during the debounce window
    Superseded,
    /// The producer succeeded and its state was applied
    Committed,
    /// The producer failed and its error was applied
    Failed,
    /// A newer admitted call or `destroy` cancelled the producer
    Cancelled,
    /// The producer panicked; nothing was applied
    Panicked,
    /// The store was destroyed before the call was admitted
    Destroyed,
}

impl ExecuteOutcome {
    /// Whether this call folded a result into the store.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}
