//! Redelivery listener — callbacks invoked when tracked identifiers time out.
//!
//! # Example
//! ```
//! use acktrack::UnackedTracker;
//! use std::time::Duration;
//!
//! let tracker: UnackedTracker<u64> = UnackedTracker::builder(Duration::from_secs(30))
//!     .tick(Duration::from_secs(1))
//!     .on_redelivery(|ids: &[u64]| {
//!         println!("redelivering {} unacknowledged messages", ids.len());
//!     })
//!     .build()
//!     .unwrap();
//!
//! tracker.add(1);
//! tracker.close();
//! ```

// ---------------------------------------------------------------------------
// RedeliveryListener trait
// ---------------------------------------------------------------------------

/// Callbacks fired by the rotation driver for a batch of identifiers whose
/// acknowledgment timeout elapsed.
///
/// Both hooks receive the same non-empty batch; `on_ack_timeout` runs first
/// (bookkeeping, metrics), then `redeliver_unacknowledged` (requeueing).
/// The tracker never invokes either with an empty slice.
///
/// The hooks run on the scheduler's thread **after** the tracker's internal
/// lock is released, so calling back into the tracker (e.g. re-`add`ing a
/// redelivered identifier) is legal and cannot deadlock.
///
/// A panic inside either hook is caught and logged; it does not stop future
/// rotations.
pub trait RedeliveryListener<M>: Send + Sync + 'static {
    /// Called first with the timed-out batch.  Default: no-op.
    fn on_ack_timeout(&self, ids: &[M]) {
        let _ = ids;
    }

    /// Called second; should request redelivery of the batch.
    fn redeliver_unacknowledged(&self, ids: &[M]);
}

/// A [`RedeliveryListener`] backed by a closure.
///
/// Created via [`TrackerBuilder::on_redelivery`](crate::TrackerBuilder::on_redelivery).
/// The closure becomes `redeliver_unacknowledged`; `on_ack_timeout` stays a
/// no-op.
pub struct FnListener<F>(pub F);

impl<M, F> RedeliveryListener<M> for FnListener<F>
where
    F: Fn(&[M]) + Send + Sync + 'static,
{
    fn redeliver_unacknowledged(&self, ids: &[M]) {
        (self.0)(ids)
    }
}
