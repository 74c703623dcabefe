use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every tracker operation.
pub(crate) struct StatsCounter {
    added: AtomicU64,
    acked: AtomicU64,
    timed_out: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            added: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_add(&self) {
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ack(&self, count: u64) {
        self.acked.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self, count: u64) {
        self.timed_out.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            added: self.added.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of tracker statistics.
///
/// Counters are cumulative over the tracker's lifetime; `clear()` does not
/// reset them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Number of `add` calls.
    pub added: u64,
    /// Number of identifiers removed by acknowledgment (`remove` hits plus
    /// everything taken by `remove_up_to`).
    pub acked: u64,
    /// Number of identifiers reported to the redelivery listener.
    pub timed_out: u64,
}
