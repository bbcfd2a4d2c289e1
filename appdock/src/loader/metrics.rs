//! Loader counters for observability and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe loader counters.
pub struct LoaderMetrics {
    loads_started: AtomicU64,
    loads_succeeded: AtomicU64,
    loads_failed: AtomicU64,
    cache_hits: AtomicU64,
    loads_joined: AtomicU64,
    retries: AtomicU64,
}

/// A point-in-time copy of the loader counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderMetricsSnapshot {
    /// Total `load_app` calls.
    pub loads_started: u64,
    /// Loads that resolved a module (leader loads only).
    pub loads_succeeded: u64,
    /// Loads that exhausted their attempts (leader loads only).
    pub loads_failed: u64,
    /// Calls served from a resolved cache entry.
    pub cache_hits: u64,
    /// Calls that joined an in-flight load.
    pub loads_joined: u64,
    /// Backoff-and-retry cycles across all loads.
    pub retries: u64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self {
            loads_started: AtomicU64::new(0),
            loads_succeeded: AtomicU64::new(0),
            loads_failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            loads_joined: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    pub fn load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_succeeded(&self) {
        self.loads_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_failed(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_joined(&self) {
        self.loads_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot for display and assertions.
    pub fn snapshot(&self) -> LoaderMetricsSnapshot {
        LoaderMetricsSnapshot {
            loads_started: self.loads_started.load(Ordering::Relaxed),
            loads_succeeded: self.loads_succeeded.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads_joined: self.loads_joined.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

impl Default for LoaderMetrics {
    fn default() -> Self {
        Self::new()
    }
}
