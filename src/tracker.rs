use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::builder::TrackerBuilder;
use crate::listener::RedeliveryListener;
use crate::ring::{required_buckets, BucketRing};
use crate::scheduler::{ScheduledHandle, Scheduler};
use crate::stats::{StatsCounter, TrackerStats};

// ---------------------------------------------------------------------------
// Tracker interior
// ---------------------------------------------------------------------------

/// Shared interior of an active tracker.
///
/// The ring and its index are guarded as one logical unit by a single
/// `RwLock`: rotation moves identifiers across buckets and must be atomic
/// over both, so per-bucket locking is ruled out.  `len`/`is_empty` take the
/// read side; everything else takes the write side.
struct Active<M> {
    ring: RwLock<BucketRing<M>>,
    ack_timeout: Duration,
    tick: Duration,
    listener: Option<Box<dyn RedeliveryListener<M>>>,
    scheduler: Arc<dyn Scheduler>,
    /// Handle to the next scheduled rotation, if any.
    pending: Mutex<Option<Box<dyn ScheduledHandle>>>,
    closed: AtomicBool,
    stats: StatsCounter,
}

enum Inner<M> {
    Active(Arc<Active<M>>),
    /// No-op variant: nothing is tracked, no rotation is ever scheduled.
    Disabled,
}

// ---------------------------------------------------------------------------
// Tracker handle
// ---------------------------------------------------------------------------

/// Tracks delivered-but-unacknowledged message identifiers and reports each
/// one to a redelivery listener exactly once after the acknowledgment
/// timeout elapses.
///
/// Identifiers are partitioned into time buckets; a rotation driver fires
/// every `tick`, evicting the oldest bucket.  Timeout granularity is `tick`:
/// an identifier expires between `ack_timeout` and `ack_timeout + tick`
/// after it was added.
///
/// Handles are cheap to clone and share one interior.  When the last handle
/// is dropped the pending rotation is cancelled.
///
/// # Example
/// ```
/// use acktrack::UnackedTracker;
/// use std::time::Duration;
///
/// let tracker: UnackedTracker<u64> = UnackedTracker::builder(Duration::from_secs(10))
///     .tick(Duration::from_secs(1))
///     .build()
///     .unwrap();
///
/// tracker.add(1);
/// tracker.add(2);
/// assert_eq!(tracker.len(), 2);
/// assert!(tracker.remove(&1));
/// tracker.close();
/// ```
pub struct UnackedTracker<M> {
    inner: Inner<M>,
}

impl<M> Clone for UnackedTracker<M> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            Inner::Active(active) => Inner::Active(Arc::clone(active)),
            Inner::Disabled => Inner::Disabled,
        };
        UnackedTracker { inner }
    }
}

impl<M> fmt::Debug for UnackedTracker<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Active(active) => f
                .debug_struct("UnackedTracker")
                .field("ack_timeout", &active.ack_timeout)
                .field("tick", &active.tick)
                .field("tracked", &active.ring.read().len())
                .finish(),
            Inner::Disabled => f.write_str("UnackedTracker(Disabled)"),
        }
    }
}

impl<M> UnackedTracker<M> {
    /// Returns the no-op variant used when acknowledgment-timeout tracking
    /// is turned off.
    ///
    /// Same contract, trivial behavior: `add`/`remove` report success,
    /// nothing is stored, no rotation ever fires.  Call sites use one type
    /// regardless of mode instead of branching.
    pub fn disabled() -> Self {
        UnackedTracker {
            inner: Inner::Disabled,
        }
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Active(active) => active.ring.read().len(),
            Inner::Disabled => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.inner {
            Inner::Active(active) => active.ring.read().is_empty(),
            Inner::Disabled => true,
        }
    }

    /// Drops every tracked identifier, leaving the ring at its full length
    /// of empty buckets.  Rotation keeps running.  Used on reset/reconnect.
    pub fn clear(&self) {
        if let Inner::Active(active) = &self.inner {
            active.ring.write().clear();
        }
    }

    /// Cumulative operation counters.
    pub fn stats(&self) -> TrackerStats {
        match &self.inner {
            Inner::Active(active) => active.stats.snapshot(),
            Inner::Disabled => TrackerStats::default(),
        }
    }

    /// The configured acknowledgment timeout, or `None` for the disabled
    /// variant.
    pub fn ack_timeout(&self) -> Option<Duration> {
        match &self.inner {
            Inner::Active(active) => Some(active.ack_timeout),
            Inner::Disabled => None,
        }
    }

    /// Cancels the pending rotation and drops all tracked state.
    ///
    /// Idempotent; safe before the first rotation has fired.  A rotation
    /// already executing completes its cycle but does not reschedule.
    pub fn close(&self) {
        if let Inner::Active(active) = &self.inner {
            active.close();
        }
    }
}

impl<M: Hash + Eq + Ord + Clone + Send + Sync + 'static> UnackedTracker<M> {
    /// Returns a [`TrackerBuilder`] for constructing an active tracker.
    pub fn builder(ack_timeout: Duration) -> TrackerBuilder<M> {
        TrackerBuilder::new(ack_timeout)
    }

    pub(crate) fn active(
        ack_timeout: Duration,
        tick: Duration,
        scheduler: Arc<dyn Scheduler>,
        listener: Option<Box<dyn RedeliveryListener<M>>>,
    ) -> Self {
        let buckets = required_buckets(ack_timeout, tick);
        let active = Arc::new(Active {
            ring: RwLock::new(BucketRing::new(buckets)),
            ack_timeout,
            tick,
            listener,
            scheduler,
            pending: Mutex::new(None),
            closed: AtomicBool::new(false),
            stats: StatsCounter::new(),
        });
        Active::schedule_next(&active);
        UnackedTracker {
            inner: Inner::Active(active),
        }
    }

    /// Starts tracking `id` as of now; it will be reported timed out between
    /// `ack_timeout` and `ack_timeout + tick` from this call unless removed
    /// first.
    ///
    /// Re-adding a tracked identifier restarts its timeout clock.  Returns
    /// whether the current tail bucket did not already contain `id`; the
    /// disabled variant always returns `true`.
    pub fn add(&self, id: M) -> bool {
        match &self.inner {
            Inner::Active(active) => {
                let added = active.ring.write().add(id);
                active.stats.record_add();
                added
            }
            Inner::Disabled => true,
        }
    }

    /// Stops tracking `id` (individual acknowledgment).
    ///
    /// Returns whether `id` was tracked; the disabled variant always
    /// returns `true`.
    pub fn remove(&self, id: &M) -> bool {
        match &self.inner {
            Inner::Active(active) => {
                let removed = active.ring.write().remove(id);
                if removed {
                    active.stats.record_ack(1);
                }
                removed
            }
            Inner::Disabled => true,
        }
    }

    /// Cumulative acknowledgment: stops tracking every identifier `<= max`
    /// and returns how many were removed.
    pub fn remove_up_to(&self, max: &M) -> usize {
        match &self.inner {
            Inner::Active(active) => {
                let removed = active.ring.write().remove_up_to(max);
                active.stats.record_ack(removed as u64);
                removed
            }
            Inner::Disabled => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rotation driver
// ---------------------------------------------------------------------------

impl<M: Hash + Eq + Ord + Clone + Send + Sync + 'static> Active<M> {
    /// Registers the next rotation with the scheduler.
    ///
    /// The closed flag is checked and the new handle stored under the
    /// `pending` lock, so a concurrent `close` either observes the handle
    /// (and cancels it) or was observed here (and nothing is scheduled).
    /// The callback captures only a `Weak` reference: dropping the last
    /// tracker handle stops the rotation chain on its own.
    fn schedule_next(this: &Arc<Self>) {
        let mut pending = this.pending.lock();
        if this.closed.load(Ordering::Acquire) {
            return;
        }
        let weak: Weak<Active<M>> = Arc::downgrade(this);
        let handle = this.scheduler.schedule_once(
            this.tick,
            Box::new(move || {
                if let Some(active) = weak.upgrade() {
                    active.rotate_once();
                }
            }),
        );
        *pending = Some(handle);
    }

    /// One rotation cycle: evict the oldest bucket under the write lock,
    /// notify the listener outside it, then reschedule.
    fn rotate_once(self: Arc<Self>) {
        let expired = self.ring.write().rotate();

        if !expired.is_empty() {
            self.stats.record_timeout(expired.len() as u64);
            warn!(
                count = expired.len(),
                timeout_ms = self.ack_timeout.as_millis() as u64,
                "unacknowledged messages timed out"
            );
            if let Some(listener) = &self.listener {
                // The lock is already released: a listener that re-enters
                // the tracker cannot deadlock.  A panicking listener must
                // not kill the rotation chain.
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    listener.on_ack_timeout(&expired);
                    listener.redeliver_unacknowledged(&expired);
                }));
                if outcome.is_err() {
                    error!("redelivery listener panicked; rotation continues");
                }
            }
        }

        Self::schedule_next(&self);
    }
}

impl<M> Active<M> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.pending.lock().take() {
            handle.cancel();
        }
        self.ring.write().clear();
        debug!("unacked message tracker closed");
    }
}

impl<M> Drop for Active<M> {
    fn drop(&mut self) {
        // Last handle gone; make sure no orphaned timer thread lingers.
        if let Some(handle) = self.pending.get_mut().take() {
            handle.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // `Debug` is what lets callers use `unwrap`/`unwrap_err`/`assert` on
    // `Result<UnackedTracker<_>, _>` values.
    #[test]
    fn debug_output_names_the_variant() {
        let disabled: UnackedTracker<u64> = UnackedTracker::disabled();
        assert_eq!(format!("{disabled:?}"), "UnackedTracker(Disabled)");

        let tracker: UnackedTracker<u64> = UnackedTracker::builder(Duration::from_secs(2))
            .tick(Duration::from_secs(1))
            .build()
            .unwrap();
        tracker.add(1);
        let rendered = format!("{tracker:?}");
        assert!(rendered.contains("tracked: 1"), "{rendered}");
        tracker.close();
    }
}
