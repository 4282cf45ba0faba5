// Tue Jan 13 2026 - Alex

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const MAX_IDLE: usize = 64;

/// Recycles `Vec` buffers. Every `PooledVec` returns its storage on drop.
pub struct ListPool<T> {
    idle: Mutex<Vec<Vec<T>>>,
    outstanding: AtomicUsize,
}

impl<T> ListPool<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        })
    }

    pub fn allocate(self: &Arc<Self>) -> PooledVec<T> {
        let items = self.idle.lock().pop().unwrap_or_default();
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        PooledVec {
            items,
            pool: self.clone(),
        }
    }

    fn recycle(&self, mut items: Vec<T>) {
        items.clear();
        self.outstanding.fetch_sub(1, Ordering::SeqCst);

        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE {
            idle.push(items);
        }
    }

    /// Buffers handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }
}

pub struct PooledVec<T> {
    items: Vec<T>,
    pool: Arc<ListPool<T>>,
}

impl<T> Deref for PooledVec<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for PooledVec<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T> Drop for PooledVec<T> {
    fn drop(&mut self) {
        self.pool.recycle(std::mem::take(&mut self.items));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_reused() {
        let pool = ListPool::<u32>::new();

        let mut first = pool.allocate();
        first.extend([1, 2, 3]);
        let capacity = first.capacity();
        assert_eq!(pool.outstanding(), 1);
        drop(first);

        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        let second = pool.allocate();
        assert!(second.is_empty());
        assert_eq!(second.capacity(), capacity);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_idle_list_is_bounded() {
        let pool = ListPool::<u8>::new();
        let buffers: Vec<_> = (0..MAX_IDLE + 10).map(|_| pool.allocate()).collect();
        assert_eq!(pool.outstanding(), MAX_IDLE + 10);

        drop(buffers);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), MAX_IDLE);
    }
}
