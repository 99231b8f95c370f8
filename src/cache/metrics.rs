use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for texture cache activity
#[derive(Debug, Default)]
pub struct CacheMetrics {
    load_times: RwLock<HashMap<String, Duration>>,
    load_counts: RwLock<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    shared_waits: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed load and its duration
    pub fn record_load(&self, key: &str, duration: Duration) {
        self.load_times.write().insert(key.to_string(), duration);
        *self.load_counts.write().entry(key.to_string()).or_insert(0) += 1;
    }

    /// Drop per-key records for keys no longer in the cache
    pub fn forget<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        let mut times = self.load_times.write();
        let mut counts = self.load_counts.write();
        for key in keys {
            times.remove(key);
            counts.remove(key);
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a caller that joined a load already in flight
    pub fn record_shared_wait(&self) {
        self.shared_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn shared_waits(&self) -> u64 {
        self.shared_waits.load(Ordering::Relaxed)
    }

    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get the cache hit rate as a percentage
    pub fn cache_hit_rate(&self) -> f32 {
        let hits = self.cache_hits() as f32;
        let misses = self.cache_misses() as f32;

        if hits + misses > 0.0 {
            hits / (hits + misses) * 100.0
        } else {
            0.0
        }
    }

    /// Duration of the most recent successful load of `key`
    pub fn last_load_time(&self, key: &str) -> Option<Duration> {
        self.load_times.read().get(key).copied()
    }

    /// Number of successful loads of `key` while it stayed in the cache
    pub fn load_count(&self, key: &str) -> u64 {
        self.load_counts.read().get(key).copied().unwrap_or(0)
    }

    pub fn all_load_times(&self) -> HashMap<String, Duration> {
        self.load_times.read().clone()
    }
}

/// Shared handle to [`CacheMetrics`]
#[derive(Debug, Clone, Default)]
pub struct CacheMetricsHandle(Arc<CacheMetrics>);

impl CacheMetricsHandle {
    pub fn new() -> Self {
        Self(Arc::new(CacheMetrics::new()))
    }

    pub fn inner(&self) -> &CacheMetrics {
        &self.0
    }
}

impl std::ops::Deref for CacheMetricsHandle {
    type Target = CacheMetrics;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
