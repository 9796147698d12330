use crate::cache::cache_impl::CacheError;
use crate::utils::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How `ExpiryList::touch` moves an entry once its timestamp changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPolicy {
    /// Unlink and re-insert in sorted position. Accepts any timestamp.
    #[default]
    Reposition,
    /// Unlink and append after the latest entry in O(1).
    ///
    /// Callers must touch with a timestamp no older than any other entry in the
    /// list, which holds when every touch reads the same monotonic clock.
    /// An older timestamp is rejected as a contract violation.
    PromoteToLatest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(
        rename = "timeout_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub timeout: Duration,
    pub touch_policy: TouchPolicy,
    #[serde(
        rename = "sweep_interval_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            touch_policy: TouchPolicy::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl CacheConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn from_json_str(data: &str) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Reads a JSON config file. Missing fields fall back to their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, CacheError> {
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&data)?;
        log::debug!("Loaded cache config from {:?}: {:?}", path, config);
        Ok(config)
    }
}

/// Serializes a `Duration` as a whole number of milliseconds.
pub fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Deserializes a number of milliseconds into a `Duration`.
pub fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}
