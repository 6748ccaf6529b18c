//! Loader metrics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing loader activity.
#[derive(Debug, Default)]
pub struct LoaderMetrics {
    /// Load attempts started.
    pub loads_started: AtomicU64,
    /// Loads served from a remote location.
    pub remote_hits: AtomicU64,
    /// Loads served from the local cache.
    pub cache_hits: AtomicU64,
    /// Loads served from the backup payload.
    pub backup_hits: AtomicU64,
    /// Remote payloads rejected as error pages.
    pub rejected_payloads: AtomicU64,
    /// Individual location fetch failures.
    pub fetch_failures: AtomicU64,
    /// Loads where every layer failed.
    pub loads_failed: AtomicU64,
    /// Listener notifications that returned an error.
    pub listener_failures: AtomicU64,
}

impl LoaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backup_hit(&self) {
        self.backup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_rejected(&self) {
        self.rejected_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load_failed(&self) {
        self.loads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn listener_failed(&self, count: usize) {
        self.listener_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> LoaderMetricsSnapshot {
        LoaderMetricsSnapshot {
            loads_started: self.loads_started.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            backup_hits: self.backup_hits.load(Ordering::Relaxed),
            rejected_payloads: self.rejected_payloads.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            loads_failed: self.loads_failed.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`LoaderMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoaderMetricsSnapshot {
    pub loads_started: u64,
    pub remote_hits: u64,
    pub cache_hits: u64,
    pub backup_hits: u64,
    pub rejected_payloads: u64,
    pub fetch_failures: u64,
    pub loads_failed: u64,
    pub listener_failures: u64,
}
