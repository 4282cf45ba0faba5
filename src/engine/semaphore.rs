// Tue Jan 13 2026 - Alex

use parking_lot::{Condvar, Mutex};

/// Counting semaphore capped at `max` outstanding permits.
pub struct Semaphore {
    permits: Mutex<usize>,
    max: usize,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize, max: usize) -> Self {
        let max = max.max(1);
        Self {
            permits: Mutex::new(initial.min(max)),
            max,
            condvar: Condvar::new(),
        }
    }

    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.condvar.wait(&mut permits);
        }
        *permits -= 1;
    }

    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Adds up to `count` permits; extra permits beyond `max` are dropped.
    pub fn release(&self, count: usize) {
        let mut permits = self.permits.lock();
        let added = count.min(self.max - *permits);
        *permits += added;
        drop(permits);

        for _ in 0..added {
            self.condvar.notify_one();
        }
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    pub fn max_permits(&self) -> usize {
        self.max
    }
}
