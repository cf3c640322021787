//! Counters for cache effectiveness and lifecycle activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by every cache operation.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    remembered: AtomicU64,
    deactivated: AtomicU64,
    deactivation_failures: AtomicU64,
    prune_passes: AtomicU64,
    scopes_pruned: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Lookups that returned an instance
    pub hits: u64,
    /// Lookups that returned nothing
    pub misses: u64,
    /// Instances added
    pub remembered: u64,
    /// Instances removed and handed to the pipeline (failures included)
    pub deactivated: u64,
    /// Deactivations that returned an error or panicked
    pub deactivation_failures: u64,
    /// Completed prune passes
    pub prune_passes: u64,
    /// Scopes found unreachable by pruning
    pub scopes_pruned: u64,
}

impl MetricsSnapshot {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remembered(&self) {
        self.remembered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deactivation(&self, failed: bool) {
        self.deactivated.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.deactivation_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_prune(&self, scopes: usize) {
        self.prune_passes.fetch_add(1, Ordering::Relaxed);
        self.scopes_pruned.fetch_add(scopes as u64, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            remembered: self.remembered.load(Ordering::Relaxed),
            deactivated: self.deactivated.load(Ordering::Relaxed),
            deactivation_failures: self.deactivation_failures.load(Ordering::Relaxed),
            prune_passes: self.prune_passes.load(Ordering::Relaxed),
            scopes_pruned: self.scopes_pruned.load(Ordering::Relaxed),
        }
    }
}
