pub mod cache;
pub mod utils;

pub use cache::cache_impl::{CacheError, CacheMetrics, StringCache, TtlCache};
pub use cache::entry::EntryId;
pub use cache::expiry_list::{ExpiryList, Iter};
pub use cache::policy::{CacheConfig, TouchPolicy};
pub use utils::{ExpiryError, Timestamp};

#[cfg(test)]
#[path = "unit_test.rs"]
pub mod unit_test;
