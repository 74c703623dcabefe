//! Time-partitioned tracking store: a ring of buckets plus an identifier index.
//!
//! ## Algorithm
//!
//! The ring is an ordered sequence of **buckets**, each a set of message
//! identifiers added during one tick interval.  The front bucket is the
//! oldest (next to expire); new arrivals always land in the back bucket.
//! The ring length is fixed at `ceil(ack_timeout / tick) + 1`, so an
//! identifier added into the tail survives between `ack_timeout` and
//! `ack_timeout + tick` before its bucket reaches the head and is evicted.
//!
//! Alongside the ring sits the **index** (`AHashMap<M, u64>`), mapping each
//! tracked identifier to the *serial number* of the bucket holding it.  The
//! bucket at position `i` has serial `head_serial + i`; each rotation bumps
//! `head_serial` by one.  The index is what makes point removal O(1): an
//! acknowledgment never scans the ring.
//!
//! The index and the buckets are kept mutually consistent at all times: an
//! identifier is in the index exactly when it is a member of the one bucket
//! whose serial the index records.  Re-adding an identifier that is still
//! tracked removes it from its old bucket before inserting it into the tail,
//! so a single identifier can never be reported expired twice.
//!
//! `BucketRing` is single-threaded on purpose — the tracker layer wraps it in
//! one `RwLock` and treats ring + index as a single logical unit, because
//! rotation moves identifiers across buckets and must be atomic over both.

use std::collections::VecDeque;
use std::hash::Hash;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};

/// Ring length for a given timeout/tick pair: `ceil(ack_timeout / tick) + 1`.
///
/// The `+ 1` is the freshly-created tail bucket: arrivals during the current
/// tick must not share a bucket with arrivals from the previous one.
pub(crate) fn required_buckets(ack_timeout: Duration, tick: Duration) -> usize {
    (ack_timeout.as_millis().div_ceil(tick.as_millis()) + 1) as usize
}

/// A sliding window of identifier sets, front = oldest, back = newest.
pub(crate) struct BucketRing<M> {
    buckets: VecDeque<AHashSet<M>>,
    /// Identifier → serial of the bucket currently holding it.
    index: AHashMap<M, u64>,
    /// Serial number of `buckets[0]`.  Incremented once per rotation.
    head_serial: u64,
}

impl<M> BucketRing<M> {
    /// Creates a ring of `len` empty buckets.
    pub fn new(len: usize) -> Self {
        BucketRing {
            buckets: (0..len).map(|_| AHashSet::new()).collect(),
            index: AHashMap::new(),
            head_serial: 0,
        }
    }

    /// Drops every tracked identifier and reinitializes the ring to its
    /// required length of fresh empty buckets.
    pub fn clear(&mut self) {
        let len = self.buckets.len();
        self.index.clear();
        self.buckets.clear();
        self.buckets.extend((0..len).map(|_| AHashSet::new()));
    }

    /// Number of identifiers currently tracked (O(1)).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Ring length; constant for the lifetime of the ring.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn tail_serial(&self) -> u64 {
        self.head_serial + self.buckets.len() as u64 - 1
    }

    fn bucket_mut(&mut self, serial: u64) -> &mut AHashSet<M> {
        let pos = (serial - self.head_serial) as usize;
        &mut self.buckets[pos]
    }
}

impl<M: Hash + Eq + Ord + Clone> BucketRing<M> {
    /// Inserts `id` into the tail bucket and points the index at it.
    ///
    /// If `id` was already tracked in an older bucket it is moved: removed
    /// from the old bucket, re-inserted into the tail.  Its timeout clock
    /// restarts from now.  Returns whether the tail bucket did not already
    /// contain `id`.
    pub fn add(&mut self, id: M) -> bool {
        let tail = self.tail_serial();
        if let Some(old) = self.index.insert(id.clone(), tail) {
            if old != tail {
                self.bucket_mut(old).remove(&id);
            }
        }
        let last = self.buckets.len() - 1;
        self.buckets[last].insert(id)
    }

    /// Removes `id` from the index and its owning bucket, O(1).
    ///
    /// Returns whether `id` was tracked.
    pub fn remove(&mut self, id: &M) -> bool {
        match self.index.remove(id) {
            Some(serial) => self.bucket_mut(serial).remove(id),
            None => false,
        }
    }

    /// Removes every tracked identifier `<= max` and returns the count.
    ///
    /// Full scan of the index — cost is proportional to the tracked-set
    /// size, not the ring length.  Cumulative acknowledgment is rare next to
    /// `add`/`remove`, and buckets are unordered sets, so a scan is what a
    /// per-bucket removal would cost anyway.
    pub fn remove_up_to(&mut self, max: &M) -> usize {
        let acked: Vec<(M, u64)> = self
            .index
            .iter()
            .filter(|&(id, _)| id <= max)
            .map(|(id, &serial)| (id.clone(), serial))
            .collect();
        for (id, serial) in &acked {
            self.bucket_mut(*serial).remove(id);
            self.index.remove(id);
        }
        acked.len()
    }

    /// Rotates the window: appends a fresh tail bucket, evicts the head
    /// bucket, and returns every identifier the head still held.
    ///
    /// Evicted identifiers are stripped from the index; the caller reports
    /// them as timed out.  Ring length is unchanged once this returns.
    pub fn rotate(&mut self) -> Vec<M> {
        self.buckets.push_back(AHashSet::new());
        let evicted = self.buckets.pop_front().unwrap_or_default();
        self.head_serial += 1;

        let mut expired = Vec::with_capacity(evicted.len());
        for id in evicted {
            self.index.remove(&id);
            expired.push(id);
        }
        expired
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
