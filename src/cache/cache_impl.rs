use crate::cache::entry::EntryId;
use crate::cache::expiry_list::ExpiryList;
use crate::cache::policy::CacheConfig;
use crate::utils::{ExpiryError, Timestamp};
use log::{debug, info};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    #[error("Entry expired: {0}")]
    Expired(String),
    #[error("Touch rejected: {0}")]
    Touch(#[from] ExpiryError),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        CacheError::Config(error.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> CacheError {
        CacheError::Config(err.to_string())
    }
}

struct CachedValue<V> {
    entry: EntryId,
    value: V,
}

/// A key-value cache whose entries are dropped once idle for the configured timeout.
///
/// Time is supplied by the caller on every call. Expired entries are only
/// removed by `expire` (or when `get` finds one that is past its timeout).
pub struct TtlCache<K, V, T = Instant> {
    list: ExpiryList<K, T>,
    map: HashMap<K, CachedValue<V>>,
    metrics: CacheMetrics,
}

/// The string-to-string cache used by the `stringcache` binary.
pub type StringCache = TtlCache<String, String, Instant>;

impl<K, V, T> TtlCache<K, V, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Timestamp,
{
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            list: ExpiryList::with_policy(config.timeout, config.touch_policy),
            map: HashMap::new(),
            metrics: CacheMetrics::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(&CacheConfig::with_timeout(timeout))
    }

    pub fn timeout(&self) -> Duration {
        self.list.timeout()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Stores `value` under `key`, stamped with `t`. An existing key keeps its
    /// entry, gets the new value and is touched.
    pub fn add(&mut self, key: K, value: V, t: T) -> Result<(), CacheError> {
        if let Some(cached) = self.map.get_mut(&key) {
            self.list.try_touch(cached.entry, t)?;
            cached.value = value;
            debug!("Replaced value for key {:?}", key);
            return Ok(());
        }

        let entry = self.list.insert(key.clone(), t);
        self.map.insert(key, CachedValue { entry, value });
        Ok(())
    }

    /// Replaces the value of an existing key and touches it.
    pub fn update(&mut self, key: &K, value: V, t: T) -> Result<(), CacheError> {
        let cached = self
            .map
            .get_mut(key)
            .ok_or_else(|| CacheError::KeyNotFound(format!("{:?}", key)))?;
        self.list.try_touch(cached.entry, t)?;
        cached.value = value;
        Ok(())
    }

    /// Returns the value for `key` and marks it as accessed at `now`.
    ///
    /// An entry already idle past the timeout is removed and reported as
    /// `Expired`, even if `expire` has not run yet.
    pub fn get(&mut self, key: &K, now: T) -> Result<&V, CacheError> {
        let Some(entry) = self.map.get(key).map(|cached| cached.entry) else {
            self.metrics.record_miss();
            return Err(CacheError::KeyNotFound(format!("{:?}", key)));
        };

        let timeout = self.list.timeout();
        let expired = self
            .list
            .timestamp(entry)
            .and_then(|t| now.checked_elapsed_since(t))
            .map_or(false, |idle| idle >= timeout);
        if expired {
            self.list.delete(entry);
            self.map.remove(key);
            self.metrics.record_miss();
            self.metrics.record_expiration();
            return Err(CacheError::Expired(format!("{:?}", key)));
        }

        self.list.try_touch(entry, now)?;
        self.metrics.record_hit();
        self.map
            .get(key)
            .map(|cached| &cached.value)
            .ok_or_else(|| CacheError::KeyNotFound(format!("{:?}", key)))
    }

    /// Returns the value without touching the entry.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|cached| &cached.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let cached = self.map.remove(key)?;
        self.list.delete(cached.entry);
        Some(cached.value)
    }

    /// Drops every entry idle for at least the timeout as of `now` and returns
    /// their keys, oldest first.
    pub fn expire(&mut self, now: T) -> Vec<K> {
        let expired = self.list.sweep(now);
        for key in &expired {
            info!("Expiring key: {:?}", key);
            self.map.remove(key);
            self.metrics.record_expiration();
        }
        expired
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn report_metrics(&self) -> String {
        self.metrics.report()
    }
}

// Counts lookups and expirations over the cache's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // e.g. "Hits: 10, Misses: 3, Expirations: 5"
    pub fn report(&self) -> String {
        format!(
            "Hits: {}, Misses: {}, Expirations: {}",
            self.hits, self.misses, self.expirations
        )
    }
}
