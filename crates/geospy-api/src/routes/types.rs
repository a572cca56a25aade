//! Request/Response DTOs for the cache admin API

use geospy_core::{CacheStats, SweepReport, cache::hit_ratio};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics for every cache plus sweeper status
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheOverviewResponse {
    pub caches: BTreeMap<String, CacheStats>,
    pub total_entries: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_ratio: f64,
    pub cleanup: CleanupStatus,
}

impl CacheOverviewResponse {
    pub fn new(caches: BTreeMap<String, CacheStats>, cleanup: CleanupStatus) -> Self {
        let total_entries: usize = caches.values().map(|s| s.entries).sum();
        let total_hits: u64 = caches.values().map(|s| s.hits).sum();
        let total_misses: u64 = caches.values().map(|s| s.misses).sum();

        Self {
            caches,
            total_entries,
            total_hits,
            total_misses,
            hit_ratio: hit_ratio(total_hits, total_misses),
            cleanup,
        }
    }
}

/// Background sweeper status
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupStatus {
    pub running: bool,
    pub interval_seconds: Option<f64>,
    pub last_sweep: Option<SweepReport>,
}

/// Response for clear operations
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

/// Response for an on-demand sweep
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub cleaned: usize,
}
