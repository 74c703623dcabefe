//! Scheduler capability: run a task once after a delay, cancellable.
//!
//! The tracker does not own a timer.  It consumes this small capability and
//! the rotation driver reschedules itself through it after every run, so any
//! timer implementation (a shared timer thread, a test clock) can drive it.
//! [`ThreadScheduler`] is the default used when no scheduler is supplied.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// "Run this task once after `delay`."
pub trait Scheduler: Send + Sync + 'static {
    fn schedule_once(&self, delay: Duration, task: Task) -> Box<dyn ScheduledHandle>;
}

/// Handle to one scheduled task.
///
/// `cancel` is idempotent.  A task that has already started running is not
/// interrupted; a task that has not yet started will never run.
pub trait ScheduledHandle: Send + Sync {
    fn cancel(&self);
}

// ---------------------------------------------------------------------------
// ThreadScheduler
// ---------------------------------------------------------------------------

/// Default scheduler: one short-lived thread per scheduled task.
///
/// The thread parks on a condvar until the delay elapses or the handle is
/// cancelled, so cancellation wakes it promptly instead of letting it sleep
/// out the full delay.  A tracker keeps at most one task outstanding at a
/// time (the next rotation), so the per-task thread cost stays bounded.
pub struct ThreadScheduler;

struct CancelGate {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

struct ThreadHandle {
    gate: Arc<CancelGate>,
}

impl ScheduledHandle for ThreadHandle {
    fn cancel(&self) {
        let mut cancelled = self.gate.cancelled.lock();
        *cancelled = true;
        self.gate.signal.notify_all();
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_once(&self, delay: Duration, task: Task) -> Box<dyn ScheduledHandle> {
        let gate = Arc::new(CancelGate {
            cancelled: Mutex::new(false),
            signal: Condvar::new(),
        });
        let worker_gate = Arc::clone(&gate);

        thread::spawn(move || {
            let deadline = Instant::now() + delay;
            let mut cancelled = worker_gate.cancelled.lock();
            while !*cancelled {
                if worker_gate
                    .signal
                    .wait_until(&mut cancelled, deadline)
                    .timed_out()
                {
                    break;
                }
            }
            let fire = !*cancelled;
            drop(cancelled);
            if fire {
                task();
            }
        });

        Box::new(ThreadHandle { gate })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn task_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        let _handle = ThreadScheduler.schedule_once(
            Duration::from_millis(10),
            Box::new(move || fired2.store(true, Ordering::SeqCst)),
        );
        thread::sleep(Duration::from_millis(100));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        let handle = ThreadScheduler.schedule_once(
            Duration::from_millis(50),
            Box::new(move || fired2.store(true, Ordering::SeqCst)),
        );
        handle.cancel();
        thread::sleep(Duration::from_millis(150));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_is_idempotent() {
        let handle = ThreadScheduler.schedule_once(Duration::from_millis(10), Box::new(|| {}));
        handle.cancel();
        handle.cancel();
    }
}
