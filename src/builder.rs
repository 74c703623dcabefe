use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::listener::{FnListener, RedeliveryListener};
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::tracker::UnackedTracker;

/// Rejected tracker configuration.
///
/// Timing parameters are programmer/configuration errors and are reported at
/// construction, never silently recovered.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick duration must be at least one millisecond")]
    ZeroTick,
    #[error("ack timeout ({ack_timeout:?}) must be at least one tick ({tick:?})")]
    AckTimeoutShorterThanTick {
        ack_timeout: Duration,
        tick: Duration,
    },
}

/// Builder for configuring and constructing an [`UnackedTracker`].
///
/// # Example
/// ```
/// use acktrack::UnackedTracker;
/// use std::time::Duration;
///
/// let tracker: UnackedTracker<u64> = UnackedTracker::builder(Duration::from_secs(30))
///     .tick(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// # tracker.close();
/// ```
pub struct TrackerBuilder<M> {
    ack_timeout: Duration,
    tick: Duration,
    scheduler: Arc<dyn Scheduler>,
    listener: Option<Box<dyn RedeliveryListener<M>>>,
}

impl<M: 'static> TrackerBuilder<M> {
    /// Starts a builder with the given acknowledgment timeout.
    ///
    /// `tick` defaults to `ack_timeout` (one rotation per whole timeout
    /// window), the scheduler defaults to [`ThreadScheduler`], and no
    /// listener is registered — timed-out batches are then only logged.
    pub fn new(ack_timeout: Duration) -> Self {
        TrackerBuilder {
            ack_timeout,
            tick: ack_timeout,
            scheduler: Arc::new(ThreadScheduler),
            listener: None,
        }
    }

    /// Sets the rotation interval — the timeout granularity.
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Supplies the timer driving the rotation.  Tests pass a manual clock
    /// here to make expiry deterministic.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Registers a redelivery closure, called with each non-empty batch of
    /// timed-out identifiers.
    ///
    /// # Example
    /// ```
    /// use acktrack::UnackedTracker;
    /// use std::time::Duration;
    ///
    /// let tracker: UnackedTracker<u64> = UnackedTracker::builder(Duration::from_secs(30))
    ///     .on_redelivery(|ids: &[u64]| eprintln!("redeliver {ids:?}"))
    ///     .build()
    ///     .unwrap();
    /// # tracker.close();
    /// ```
    pub fn on_redelivery<F>(mut self, f: F) -> Self
    where
        F: Fn(&[M]) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Registers a listener via the [`RedeliveryListener`] trait, for
    /// collaborators that also want the `on_ack_timeout` hook.
    pub fn listener<L: RedeliveryListener<M>>(mut self, listener: L) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }
}

impl<M: Hash + Eq + Ord + Clone + Send + Sync + 'static> TrackerBuilder<M> {
    /// Validates the timing parameters and starts the tracker.
    ///
    /// The first rotation is scheduled one tick from now.
    pub fn build(self) -> Result<UnackedTracker<M>, ConfigError> {
        if self.tick.as_millis() == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.ack_timeout < self.tick {
            return Err(ConfigError::AckTimeoutShorterThanTick {
                ack_timeout: self.ack_timeout,
                tick: self.tick,
            });
        }
        Ok(UnackedTracker::active(
            self.ack_timeout,
            self.tick,
            self.scheduler,
            self.listener,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_tick() {
        let err = TrackerBuilder::<u64>::new(Duration::from_secs(1))
            .tick(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroTick);
    }

    #[test]
    fn rejects_sub_millisecond_tick() {
        let err = TrackerBuilder::<u64>::new(Duration::from_secs(1))
            .tick(Duration::from_micros(500))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroTick);
    }

    #[test]
    fn rejects_timeout_shorter_than_tick() {
        let err = TrackerBuilder::<u64>::new(Duration::from_millis(100))
            .tick(Duration::from_millis(200))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::AckTimeoutShorterThanTick { .. }));
    }

    #[test]
    fn tick_defaults_to_ack_timeout() {
        let tracker = TrackerBuilder::<u64>::new(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(tracker.ack_timeout(), Some(Duration::from_secs(5)));
        tracker.close();
    }
}
