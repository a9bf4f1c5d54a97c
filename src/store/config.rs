//! Store configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default debounce window of `Store::execute`.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Default number of triples buffered per stream subscriber.
pub const DEFAULT_STREAM_CAPACITY: usize = 16;

/// Largest stream buffer a store accepts. The buffer is allocated up front.
pub const MAX_STREAM_CAPACITY: usize = 1 << 16;

/// Tunables for one store.
///
/// Deserializes from a table such as `{ "debounce_ms": 300 }`; missing
/// keys fall back to the defaults.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tristore::store::StoreConfig;
///
/// let config: StoreConfig = serde_json::from_str(r#"{ "debounce_ms": 300 }"#).unwrap();
/// assert_eq!(config.debounce, Duration::from_millis(300));
/// assert_eq!(config.stream_capacity, 16);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Quiescence window before an `execute` call is admitted
    #[serde(rename = "debounce_ms", with = "duration_ms")]
    pub debounce: Duration,
    /// Buffer size of the broadcast stream behind `Store::subscribe`
    pub stream_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
