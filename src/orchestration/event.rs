// Tue Jan 13 2026 - Alex

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Manual-reset event. Starts unsignaled; stays signaled until `reset`.
pub struct WaitHandle {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl WaitHandle {
    pub fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Returns false if the timeout elapsed before the handle was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();

        while !*signaled {
            if self.condvar.wait_until(&mut signaled, deadline).timed_out() {
                return *signaled;
            }
        }

        true
    }
}

impl Default for WaitHandle {
    fn default() -> Self {
        Self::new()
    }
}
