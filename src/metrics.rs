//! Counters tracking the coordinator's lifetime activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time, independently owned copy of the coordinator's counters.
///
/// Each field is read with its own atomic load, so a snapshot is consistent
/// per-counter but not necessarily across counters if a batch cycle completes
/// concurrently with the read. Callers should not assume two fields of the
/// same snapshot were captured atomically with respect to each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total number of submissions that were dispatched to an executor.
    pub total_items: u64,
    /// Total number of executor invocations.
    pub total_batches: u64,
    /// Total number of submissions rejected with `QueueFull`.
    pub total_dropped: u64,
    /// Total number of submissions whose batch failed (executor error or
    /// shape mismatch).
    pub total_errors: u64,
}

/// The coordinator's counter register. Monotonically non-decreasing;
/// `Batcher::metrics()` hands out copies, never a live reference.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    total_items: AtomicU64,
    total_batches: AtomicU64,
    total_dropped: AtomicU64,
    total_errors: AtomicU64,
}

impl Metrics {
    pub(crate) fn record_batch(&self, size: usize, failed: bool) {
        self.total_items.fetch_add(size as u64, Ordering::Relaxed);
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.total_errors.fetch_add(size as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_drop(&self) {
        self.total_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_items: self.total_items.load(Ordering::Relaxed),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let m = Metrics::default();
        m.record_batch(3, false);
        m.record_batch(2, true);
        m.record_drop();

        let snap = m.snapshot();
        assert_eq!(snap.total_items, 5);
        assert_eq!(snap.total_batches, 2);
        assert_eq!(snap.total_errors, 2);
        assert_eq!(snap.total_dropped, 1);
    }

    #[test]
    fn default_snapshot_is_zero() {
        assert_eq!(Metrics::default().snapshot(), MetricsSnapshot::default());
    }
}
