//! Cache statistics snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time statistics for a single named cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub name: String,
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: f64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub entries: usize,
}

/// Fraction of lookups that were hits, 0 when nothing was looked up
pub fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total > 0 {
        hits as f64 / total as f64
    } else {
        0.0
    }
}

/// Outcome of one sweep across every registered cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Entries removed in this sweep
    pub removed: usize,
    /// Caches visited
    pub caches: usize,
    /// Caches whose cleanup panicked
    pub failed: usize,
    pub finished_at: DateTime<Utc>,
}
