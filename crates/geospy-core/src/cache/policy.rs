//! Eviction policy: expired entries first, then least recently used

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A stored value with its bookkeeping timestamps
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub value: V,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    /// Insertion sequence, breaks ties between equal access times
    pub seq: u64,
}

impl<V> Entry<V> {
    pub fn new(value: V, now: Instant, seq: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            seq,
        }
    }

    /// An entry is expired once strictly more than `ttl` has passed since insertion
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

/// Keys of every entry older than `ttl`
pub(crate) fn expired_keys<V>(
    entries: &HashMap<String, Entry<V>>,
    now: Instant,
    ttl: Duration,
) -> Vec<String> {
    entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now, ttl))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Key of the least recently accessed entry, earliest insertion on ties
pub(crate) fn lru_victim<V>(entries: &HashMap<String, Entry<V>>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, entry)| (entry.last_accessed_at, entry.seq))
        .map(|(key, _)| key.clone())
}
