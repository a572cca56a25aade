//! GeoSpy cache core
//!
//! This crate provides the in-process caching layer used by the geolocation
//! services: named, size-bounded caches with TTL expiry and LRU eviction,
//! and a manager that owns them and sweeps expired entries in the background.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{
    Cache, CacheConfig, CacheMaintenance, CacheManager, CacheStats, Clock, ManualClock,
    SweepReport, SystemClock, keys,
};
pub use config::{CacheSettings, NamedCacheConfig};
pub use error::CacheError;
