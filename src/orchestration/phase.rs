// Tue Jan 13 2026 - Alex

use crate::orchestration::event::WaitHandle;
use parking_lot::Mutex;
use std::time::Duration;

/// Identifies one use of a `PhaseSignal`. Completions carrying an older
/// token are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseToken(u64);

#[derive(Debug, Default)]
struct PhaseCount {
    generation: u64,
    completed: usize,
    expected: usize,
}

/// Reusable fan-in: signals its wait handle once `expected` units report in.
pub struct PhaseSignal {
    name: String,
    count: Mutex<PhaseCount>,
    handle: WaitHandle,
}

impl PhaseSignal {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: Mutex::new(PhaseCount::default()),
            handle: WaitHandle::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resets the counter and the handle for a new round of `expected` units.
    pub fn begin(&self, expected: usize) -> PhaseToken {
        let mut count = self.count.lock();
        count.generation += 1;
        count.completed = 0;
        count.expected = expected;

        self.handle.reset();
        if expected == 0 {
            self.handle.set();
        }

        PhaseToken(count.generation)
    }

    /// Counts one finished unit. Returns true for the call that signals.
    pub fn unit_done(&self, token: PhaseToken) -> bool {
        let mut count = self.count.lock();
        if count.generation != token.0 || count.completed >= count.expected {
            return false;
        }

        count.completed += 1;
        if count.completed == count.expected {
            self.handle.set();
            return true;
        }
        false
    }

    /// Signals immediately if `token` is still current.
    pub fn finish(&self, token: PhaseToken) {
        let count = self.count.lock();
        if count.generation == token.0 {
            self.handle.set();
        }
    }

    /// Signals regardless of generation, releasing any waiter.
    pub fn release(&self) {
        let _count = self.count.lock();
        self.handle.set();
    }

    pub fn wait(&self, timeout: Duration) -> bool {
        self.handle.wait_timeout(timeout)
    }

    pub fn completed(&self) -> usize {
        self.count.lock().completed
    }

    pub fn is_signaled(&self) -> bool {
        self.handle.is_set()
    }
}
