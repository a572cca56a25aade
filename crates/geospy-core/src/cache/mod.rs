//! In-process caching: bounded TTL/LRU caches and their manager

mod clock;
pub mod keys;
mod manager;
mod policy;
mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock, system_clock};
pub use manager::{CacheMaintenance, CacheManager};
pub use stats::{CacheStats, SweepReport, hit_ratio};
pub use store::{Cache, CacheConfig};
