use crate::cache::entry::EntryId;
use std::fmt;
use std::time::{Duration, Instant, SystemTime};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60); // Idle time after which an entry is swept
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5); // How often the demo binary sweeps

/// A point in time drawn from a caller-chosen clock.
///
/// The list only ever orders timestamps and measures the distance between two of
/// them, so any monotonic or wall clock can be plugged in.
pub trait Timestamp: Copy + Ord + fmt::Debug {
    /// Returns how long after `earlier` this timestamp is, or `None` if `earlier`
    /// is actually later than `self`.
    fn checked_elapsed_since(&self, earlier: Self) -> Option<Duration>;
}

impl Timestamp for Instant {
    fn checked_elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_duration_since(earlier)
    }
}

impl Timestamp for tokio::time::Instant {
    fn checked_elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_duration_since(earlier)
    }
}

impl Timestamp for SystemTime {
    fn checked_elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.duration_since(earlier).ok()
    }
}

// Offset from an arbitrary epoch. Handy for deterministic clocks.
impl Timestamp for Duration {
    fn checked_elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_sub(earlier)
    }
}

/// Contract violations reported by `ExpiryList`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryError {
    #[error("entry {0:?} is not linked into this list")]
    StaleEntry(EntryId),
    #[error("promote to {requested} is older than the latest timestamp {latest}")]
    NonMonotonicTouch { requested: String, latest: String },
    #[error("list links are corrupted: {0}")]
    Corrupted(String),
}
