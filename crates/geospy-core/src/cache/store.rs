//! Named, bounded, TTL-aware key/value cache

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::clock::{Clock, system_clock};
use super::policy::{self, Entry};
use super::stats::{CacheStats, hit_ratio};
use crate::error::CacheError;

/// Configuration for a single cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub max_size: usize,
    /// Freshness window, measured from insertion
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { max_size, ttl }
    }

    /// Reject zero capacity or zero TTL
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a locked lookup, reported after the lock is released
enum Lookup<V> {
    Hit(V),
    Expired,
    Missing,
}

/// What a capacity-triggered eviction removed
#[derive(Default)]
struct Eviction {
    expired: usize,
    lru: Option<String>,
}

struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

impl<V> CacheInner<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            next_seq: 0,
        }
    }

    fn lookup(&mut self, key: &str, now: Instant, ttl: Duration) -> Lookup<V>
    where
        V: Clone,
    {
        match self.entries.get_mut(key) {
            None => {
                self.misses += 1;
                Lookup::Missing
            }
            Some(entry) if entry.is_expired(now, ttl) => {
                self.entries.remove(key);
                self.misses += 1;
                Lookup::Expired
            }
            Some(entry) => {
                entry.last_accessed_at = now;
                self.hits += 1;
                Lookup::Hit(entry.value.clone())
            }
        }
    }

    fn insert(&mut self, key: String, value: V, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Entry::new(value, now, seq));
    }

    fn remove_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let expired = policy::expired_keys(&self.entries, now, ttl);
        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }

    /// Free one slot: purge expired entries, then drop the LRU entry if still full
    fn make_room(&mut self, now: Instant, config: &CacheConfig) -> Eviction {
        let expired = self.remove_expired(now, config.ttl);

        let lru = if self.entries.len() >= config.max_size {
            policy::lru_victim(&self.entries).inspect(|key| {
                self.entries.remove(key);
            })
        } else {
            None
        };

        Eviction { expired, lru }
    }
}

/// Thread-safe cache with TTL expiry and LRU eviction
///
/// All state sits behind one mutex; operations are short and never perform
/// I/O while holding it. Values are cloned out on `get`, so large payloads
/// are best stored as `Arc<T>`.
pub struct Cache<V> {
    name: String,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<V>>,
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V> Cache<V> {
    /// Create a new cache using the system clock
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Result<Self, CacheError> {
        Self::with_clock(name, config, system_clock())
    }

    /// Create a new cache driven by the given clock
    pub fn with_clock(
        name: impl Into<String>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CacheError::InvalidConfig(
                "cache name must not be empty".to_string(),
            ));
        }
        config.validate()?;

        info!(
            "Cache '{}' initialized (max_size: {}, ttl: {:?})",
            name, config.max_size, config.ttl
        );

        Ok(Self {
            name,
            config,
            clock,
            inner: Mutex::new(CacheInner::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Get a live value, counting a hit or a miss
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let now = self.clock.now();
        let lookup = self.inner.lock().lookup(key, now, self.config.ttl);

        match lookup {
            Lookup::Hit(value) => {
                debug!("Cache '{}': hit for key '{}'", self.name, key);
                metrics::counter!("geospy_cache_hits_total", "cache" => self.name.clone())
                    .increment(1);
                Some(value)
            }
            Lookup::Expired => {
                debug!("Cache '{}': expired key '{}'", self.name, key);
                metrics::counter!("geospy_cache_misses_total", "cache" => self.name.clone())
                    .increment(1);
                metrics::counter!("geospy_cache_expired_total", "cache" => self.name.clone())
                    .increment(1);
                None
            }
            Lookup::Missing => {
                debug!("Cache '{}': miss for key '{}'", self.name, key);
                metrics::counter!("geospy_cache_misses_total", "cache" => self.name.clone())
                    .increment(1);
                None
            }
        }
    }

    /// Insert or overwrite a value
    ///
    /// Only a new key arriving at capacity triggers eviction.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.now();
        debug!("Cache '{}': set for key '{}'", self.name, key);

        let eviction = {
            let mut inner = self.inner.lock();
            let eviction = if !inner.entries.contains_key(&key)
                && inner.entries.len() >= self.config.max_size
            {
                inner.make_room(now, &self.config)
            } else {
                Eviction::default()
            };
            inner.insert(key, value, now);
            eviction
        };

        if eviction.expired > 0 {
            debug!(
                "Cache '{}': evicted {} expired entries",
                self.name, eviction.expired
            );
            metrics::counter!(
                "geospy_cache_evictions_total",
                "cache" => self.name.clone(),
                "reason" => "expired"
            )
            .increment(eviction.expired as u64);
        }
        if let Some(victim) = eviction.lru {
            debug!("Cache '{}': LRU eviction for key '{}'", self.name, victim);
            metrics::counter!(
                "geospy_cache_evictions_total",
                "cache" => self.name.clone(),
                "reason" => "lru"
            )
            .increment(1);
        }
    }

    /// Check for a live entry without touching LRU order or counters
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, self.config.ttl))
    }

    /// Remove every entry, returning how many were dropped
    ///
    /// Hit and miss counters are lifetime statistics and survive a clear.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.entries.len();
            inner.entries.clear();
            removed
        };
        info!("Cache '{}': cleared {} entries", self.name, removed);
        removed
    }

    /// Zero the hit and miss counters
    pub fn reset_stats(&self) {
        let mut inner = self.inner.lock();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// Remove all expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.inner.lock().remove_expired(now, self.config.ttl);

        if removed > 0 {
            debug!("Cache '{}': removed {} expired entries", self.name, removed);
            metrics::counter!("geospy_cache_sweep_removed_total", "cache" => self.name.clone())
                .increment(removed as u64);
        }
        removed
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let size = inner.entries.len();

        CacheStats {
            name: self.name.clone(),
            size,
            max_size: self.config.max_size,
            ttl_seconds: self.config.ttl.as_secs_f64(),
            hits: inner.hits,
            misses: inner.misses,
            hit_ratio: hit_ratio(inner.hits, inner.misses),
            entries: size,
        }
    }

    /// Return the cached value or compute and store it
    pub fn get_or_insert_with<F>(&self, key: &str, f: F) -> V
    where
        V: Clone,
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = f();
        self.set(key, value.clone());
        value
    }

    /// Return the cached value or run a fallible computation
    ///
    /// The computation runs without the cache lock held. Errors are handed
    /// back untouched and nothing is stored, so the next caller retries.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, f: F) -> Result<V, E>
    where
        V: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = f()?;
        self.set(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use std::thread;

    fn test_cache(max_size: usize, ttl_secs: u64) -> (Cache<i32>, ManualClock) {
        let clock = ManualClock::new();
        let cache = Cache::with_clock(
            "test",
            CacheConfig::new(max_size, Duration::from_secs(ttl_secs)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (cache, clock)
    }

    #[test]
    fn test_invalid_config() {
        let zero_size = Cache::<i32>::new("c", CacheConfig::new(0, Duration::from_secs(1)));
        assert!(matches!(zero_size, Err(CacheError::InvalidConfig(_))));

        let zero_ttl = Cache::<i32>::new("c", CacheConfig::new(1, Duration::ZERO));
        assert!(matches!(zero_ttl, Err(CacheError::InvalidConfig(_))));

        let no_name = Cache::<i32>::new("", CacheConfig::default());
        assert!(matches!(no_name, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_miss_counts() {
        let (cache, _clock) = test_cache(10, 100);

        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.get("other"), None);

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_ratio, 0.0);
    }

    #[test]
    fn test_set_then_get_hits() {
        let (cache, _clock) = test_cache(10, 100);

        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_ratio, 1.0);
    }

    #[test]
    fn test_expired_get_removes_entry() {
        let (cache, clock) = test_cache(10, 1);

        cache.set("x", 1);
        clock.advance(Duration::from_millis(1100));

        assert_eq!(cache.get("x"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_entry_live_at_exact_ttl() {
        let (cache, clock) = test_cache(10, 5);

        cache.set("x", 1);
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.get("x"), Some(1));
    }

    #[test]
    fn test_access_does_not_extend_ttl() {
        let (cache, clock) = test_cache(10, 10);

        cache.set("x", 1);
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("x"), Some(1));
        clock.advance(Duration::from_secs(3));

        assert_eq!(cache.get("x"), None);
    }

    #[test]
    fn test_lru_eviction_scenario() {
        let (cache, clock) = test_cache(2, 100);

        cache.set("a", 1);
        clock.advance(Duration::from_millis(10));
        cache.set("b", 2);
        clock.advance(Duration::from_millis(10));
        assert_eq!(cache.get("a"), Some(1));
        clock.advance(Duration::from_millis(10));
        cache.set("c", 3);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_ties_evict_first_inserted() {
        // Clock never moves, so every access time is identical
        let (cache, _clock) = test_cache(3, 100);

        cache.set("first", 1);
        cache.set("second", 2);
        cache.set("third", 3);
        cache.set("fourth", 4);

        assert!(!cache.contains("first"));
        assert!(cache.contains("second"));
        assert!(cache.contains("third"));
        assert!(cache.contains("fourth"));
    }

    #[test]
    fn test_eviction_prefers_expired_entries() {
        let (cache, clock) = test_cache(3, 10);

        cache.set("stale", 1);
        clock.advance(Duration::from_secs(6));
        cache.set("b", 2);
        cache.set("c", 3);
        // Touch the stale entry so LRU alone would keep it
        assert_eq!(cache.get("stale"), Some(1));
        clock.advance(Duration::from_secs(5));

        cache.set("d", 4);

        assert!(!cache.contains("stale"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_eviction_removes_all_expired() {
        let (cache, clock) = test_cache(3, 10);

        cache.set("a", 1);
        cache.set("b", 2);
        clock.advance(Duration::from_secs(6));
        cache.set("c", 3);
        clock.advance(Duration::from_secs(5));

        cache.set("d", 4);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, _clock) = test_cache(2, 100);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_overwrite_restamps_creation_time() {
        let (cache, clock) = test_cache(10, 10);

        cache.set("a", 1);
        clock.advance(Duration::from_secs(8));
        cache.set("a", 2);
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let (cache, clock) = test_cache(5, 100);

        for i in 0..50 {
            cache.set(format!("key-{}", i), i);
            clock.advance(Duration::from_millis(1));
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_contains_leaves_counters_and_order() {
        let (cache, clock) = test_cache(2, 100);

        cache.set("a", 1);
        clock.advance(Duration::from_millis(10));
        cache.set("b", 2);
        clock.advance(Duration::from_millis(10));

        // contains must not refresh "a"
        assert!(cache.contains("a"));
        assert!(!cache.contains("zzz"));
        cache.set("c", 3);

        assert!(!cache.contains("a"));
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_contains_reports_expired_as_absent() {
        let (cache, clock) = test_cache(10, 1);

        cache.set("x", 1);
        clock.advance(Duration::from_secs(2));

        assert!(!cache.contains("x"));
        // Left in place for the sweep or the next get
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.get("x"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let (cache, _clock) = test_cache(10, 100);

        cache.set("a", 1);
        cache.set("b", 2);
        cache.get("a");
        cache.get("missing");

        assert_eq!(cache.clear(), 2);

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_reset_stats() {
        let (cache, _clock) = test_cache(10, 100);

        cache.set("a", 1);
        cache.get("a");
        cache.get("b");
        cache.reset_stats();

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_cleanup_expired_counts() {
        let (cache, clock) = test_cache(10, 10);

        cache.set("a", 1);
        cache.set("b", 2);
        clock.advance(Duration::from_secs(6));
        cache.set("c", 3);
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let (cache, _clock) = test_cache(7, 30);

        cache.set("a", 1);
        cache.get("a");
        cache.get("a");
        cache.get("a");
        cache.get("b");

        let stats = cache.stats();
        assert_eq!(stats.name, "test");
        assert_eq!(stats.size, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.max_size, 7);
        assert_eq!(stats.ttl_seconds, 30.0);
        assert_eq!(stats.hit_ratio, 0.75);
    }

    #[test]
    fn test_get_or_try_insert_with() {
        let (cache, _clock) = test_cache(10, 100);

        let computed: Result<i32, String> = cache.get_or_try_insert_with("k", || Ok(5));
        assert_eq!(computed, Ok(5));

        let cached: Result<i32, String> =
            cache.get_or_try_insert_with("k", || panic!("should not recompute"));
        assert_eq!(cached, Ok(5));
    }

    #[test]
    fn test_get_or_try_insert_with_error_stores_nothing() {
        let (cache, _clock) = test_cache(10, 100);

        let failed: Result<i32, String> =
            cache.get_or_try_insert_with("k", || Err("upstream down".to_string()));
        assert_eq!(failed, Err("upstream down".to_string()));
        assert!(!cache.contains("k"));

        assert_eq!(cache.get_or_insert_with("k", || 9), 9);
        assert_eq!(cache.get("k"), Some(9));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(
            Cache::<usize>::new("shared", CacheConfig::new(64, Duration::from_secs(60))).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("{}-{}", t, i % 16);
                        cache.set(key.clone(), i);
                        cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert!(stats.entries <= 64);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
    }
}
