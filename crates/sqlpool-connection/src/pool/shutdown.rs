//! Stop signal for the background workers

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot stop flag that timed waits can be interrupted by.
///
/// The eviction worker sleeps on this instead of the pool condvar, so its
/// polling period is independent of acquire/release traffic.
pub(crate) struct ShutdownSignal {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn fire(&self) {
        *self.fired.lock() = true;
        self.cond.notify_all();
    }

    /// Sleep for `timeout` or until fired. Returns whether the signal fired.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.fired.lock();
        while !*fired {
            if self.cond.wait_until(&mut fired, deadline).timed_out() {
                break;
            }
        }
        *fired
    }
}
