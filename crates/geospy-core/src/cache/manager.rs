//! Registry of named caches with a background expiry sweeper

use chrono::Utc;
use parking_lot::{Condvar, Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, system_clock};
use super::stats::{CacheStats, SweepReport};
use super::store::{Cache, CacheConfig};
use crate::error::CacheError;

/// How long `stop_cleanup_thread` waits for the sweeper to exit
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Type-erased maintenance operations the manager runs on every cache
pub trait CacheMaintenance: Send + Sync {
    fn name(&self) -> &str;
    fn cleanup_expired(&self) -> usize;
    fn clear(&self) -> usize;
    fn stats(&self) -> CacheStats;
}

impl<V: Send + 'static> CacheMaintenance for Cache<V> {
    fn name(&self) -> &str {
        Cache::name(self)
    }

    fn cleanup_expired(&self) -> usize {
        Cache::cleanup_expired(self)
    }

    fn clear(&self) -> usize {
        Cache::clear(self)
    }

    fn stats(&self) -> CacheStats {
        Cache::stats(self)
    }
}

/// A registered cache, kept both erased and downcastable to `Cache<V>`
#[derive(Clone)]
struct Registered {
    maintenance: Arc<dyn CacheMaintenance>,
    typed: Arc<dyn Any + Send + Sync>,
}

impl Registered {
    fn new<V: Send + 'static>(cache: Arc<Cache<V>>) -> Self {
        Self {
            maintenance: cache.clone(),
            typed: cache,
        }
    }

    fn downcast<V: Send + 'static>(&self, name: &str) -> Result<Arc<Cache<V>>, CacheError> {
        self.typed
            .clone()
            .downcast::<Cache<V>>()
            .map_err(|_| CacheError::TypeMismatch {
                name: name.to_string(),
            })
    }
}

/// State shared between the manager and its sweeper thread
struct Shared {
    caches: RwLock<HashMap<String, Registered>>,
    last_sweep: Mutex<Option<SweepReport>>,
}

impl Shared {
    /// Clone out the registered caches so no registry lock is held during cache calls
    fn snapshot(&self) -> Vec<Arc<dyn CacheMaintenance>> {
        self.caches
            .read()
            .values()
            .map(|registered| registered.maintenance.clone())
            .collect()
    }

    /// Sweep every cache once; a panic in one cache does not stop the others
    fn sweep(&self) -> SweepReport {
        let caches = self.snapshot();
        let mut removed = 0;
        let mut failed = 0;

        for cache in &caches {
            match panic::catch_unwind(AssertUnwindSafe(|| cache.cleanup_expired())) {
                Ok(count) => removed += count,
                Err(payload) => {
                    failed += 1;
                    error!(
                        "Cache '{}': cleanup failed: {}",
                        cache.name(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        let report = SweepReport {
            removed,
            caches: caches.len(),
            failed,
            finished_at: Utc::now(),
        };
        *self.last_sweep.lock() = Some(report.clone());
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Stop flag the sweeper waits on between sweeps
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep for `timeout` unless stopped first; returns the stop flag
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.condvar
                .wait_while_for(&mut stopped, |stopped| !*stopped, timeout);
        }
        *stopped
    }
}

struct Sweeper {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
    interval: Duration,
}

fn run_sweeper(shared: Arc<Shared>, signal: Arc<StopSignal>, interval: Duration) {
    while !signal.is_stopped() {
        if signal.wait(interval) {
            break;
        }

        let report = shared.sweep();
        if report.removed > 0 {
            info!(
                "Cache cleanup: removed {} expired entries across {} caches",
                report.removed, report.caches
            );
        } else {
            debug!("Cache cleanup: nothing expired in {} caches", report.caches);
        }
    }
}

/// Central registry for all named caches of the application
///
/// Build one at startup and share it as `Arc<CacheManager>`. Caches are
/// created lazily on first request and live as long as the manager. The
/// optional sweeper thread removes expired entries on a fixed interval and
/// is stopped when the manager is dropped.
pub struct CacheManager {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager {
    /// Create a new cache manager using the system clock
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create a cache manager whose caches all use the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                caches: RwLock::new(HashMap::new()),
                last_sweep: Mutex::new(None),
            }),
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Get the cache registered under `name`, creating it on first request
    ///
    /// The first caller's `max_size` and `ttl` win; later calls return the
    /// existing instance and ignore them. Validation only applies when a
    /// cache is actually created.
    pub fn get_or_create_cache<V: Send + 'static>(
        &self,
        name: &str,
        max_size: usize,
        ttl: Duration,
    ) -> Result<Arc<Cache<V>>, CacheError> {
        if let Some(registered) = self.shared.caches.read().get(name) {
            return registered.downcast(name);
        }

        let mut caches = self.shared.caches.write();
        if let Some(registered) = caches.get(name) {
            return registered.downcast(name);
        }

        let cache = Arc::new(Cache::with_clock(
            name,
            CacheConfig::new(max_size, ttl),
            self.clock.clone(),
        )?);
        caches.insert(name.to_string(), Registered::new(cache.clone()));
        Ok(cache)
    }

    /// Look up an existing cache without creating it
    pub fn get_cache<V: Send + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<Cache<V>>>, CacheError> {
        self.shared
            .caches
            .read()
            .get(name)
            .map(|registered| registered.downcast(name))
            .transpose()
    }

    /// Names of all registered caches, sorted
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Statistics for one cache
    pub fn stats_for(&self, name: &str) -> Option<CacheStats> {
        let cache = self.shared.caches.read().get(name)?.maintenance.clone();
        Some(cache.stats())
    }

    /// Statistics for every registered cache, keyed by name
    pub fn get_all_stats(&self) -> BTreeMap<String, CacheStats> {
        self.shared
            .snapshot()
            .into_iter()
            .map(|cache| (cache.name().to_string(), cache.stats()))
            .collect()
    }

    /// Clear one cache, returning the number of entries removed
    pub fn clear_cache(&self, name: &str) -> Result<usize, CacheError> {
        let cache = self
            .shared
            .caches
            .read()
            .get(name)
            .map(|registered| registered.maintenance.clone())
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        Ok(cache.clear())
    }

    /// Clear every registered cache, returning the number of entries removed
    pub fn clear_all_caches(&self) -> usize {
        let cleared: usize = self
            .shared
            .snapshot()
            .iter()
            .map(|cache| cache.clear())
            .sum();
        info!("Cleared all caches ({} entries)", cleared);
        cleared
    }

    /// Run one sweep now and return the number of expired entries removed
    pub fn cleanup_all(&self) -> usize {
        let report = self.shared.sweep();
        if report.removed > 0 {
            info!("Cache cleanup: removed {} expired entries", report.removed);
        }
        report.removed
    }

    /// Outcome of the most recent sweep, manual or scheduled
    pub fn last_sweep(&self) -> Option<SweepReport> {
        self.shared.last_sweep.lock().clone()
    }

    /// Start the background sweeper; a no-op when it is already running
    pub fn start_cleanup_thread(&self, interval: Duration) -> Result<(), CacheError> {
        if interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }

        let mut sweeper = self.sweeper.lock();
        if let Some(running) = sweeper.as_ref() {
            if !running.handle.is_finished() {
                debug!("Cache cleanup thread already running");
                return Ok(());
            }
            warn!("Cache cleanup thread exited unexpectedly, restarting");
        }

        let shared = self.shared.clone();
        let signal = Arc::new(StopSignal::new());
        let thread_signal = signal.clone();
        let (done_tx, done) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cache-cleanup".to_string())
            .spawn(move || {
                run_sweeper(shared, thread_signal, interval);
                let _ = done_tx.send(());
            })
            .map_err(|e| CacheError::Spawn(e.to_string()))?;

        *sweeper = Some(Sweeper {
            signal,
            handle,
            done,
            interval,
        });

        info!("Started cache cleanup thread (interval: {:?})", interval);
        Ok(())
    }

    /// Stop the background sweeper; a no-op when it is not running
    ///
    /// Waits up to a bounded timeout for the thread to finish its current
    /// cycle. A thread that does not exit in time is detached.
    pub fn stop_cleanup_thread(&self) {
        let Some(sweeper) = self.sweeper.lock().take() else {
            return;
        };

        sweeper.signal.stop();

        match sweeper.done.recv_timeout(STOP_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if sweeper.handle.join().is_err() {
                    warn!("Cache cleanup thread panicked");
                }
                info!("Stopped cache cleanup thread");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Cache cleanup thread did not stop within {:?}, detaching",
                    STOP_TIMEOUT
                );
            }
        }
    }

    /// Whether the background sweeper is running
    pub fn is_cleanup_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|sweeper| !sweeper.handle.is_finished())
    }

    /// Interval of the running sweeper, if any
    pub fn cleanup_interval(&self) -> Option<Duration> {
        self.sweeper
            .lock()
            .as_ref()
            .filter(|sweeper| !sweeper.handle.is_finished())
            .map(|sweeper| sweeper.interval)
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.stop_cleanup_thread();
    }
}
