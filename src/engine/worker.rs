// Tue Jan 13 2026 - Alex

use crate::engine::error::SchedulerError;
use crate::engine::scheduler::SchedulerShared;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Waiting,
    Draining,
    Disposed,
}

pub struct Worker {
    id: usize,
    name: String,
    thread_handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(id: usize, name: String, shared: Arc<SchedulerShared>) -> Result<Self, SchedulerError> {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Worker::worker_loop(id, shared))
            .map_err(|e| SchedulerError::Spawn(name.clone(), e))?;

        Ok(Self {
            id,
            name,
            thread_handle: Some(handle),
        })
    }

    fn worker_loop(id: usize, shared: Arc<SchedulerShared>) {
        let mut state = WorkerState::Waiting;

        while state != WorkerState::Disposed {
            state = match state {
                WorkerState::Waiting => {
                    shared.wait_for_work();
                    if shared.active_batch().is_some() {
                        WorkerState::Draining
                    } else if shared.is_disposed() {
                        WorkerState::Disposed
                    } else {
                        WorkerState::Waiting
                    }
                }
                WorkerState::Draining => {
                    // The active batch cannot change until this worker reports in.
                    if let Some(batch) = shared.active_batch() {
                        while shared.do_next_item(batch.as_ref(), id) {}
                    }
                    shared.report_inactive();
                    WorkerState::Waiting
                }
                WorkerState::Disposed => WorkerState::Disposed,
            };
        }

        log::trace!("Worker {} exiting", id);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::warn!("Worker {} ({}) terminated abnormally", self.id, self.name);
            }
        }
    }

    pub fn thread_id(&self) -> Option<ThreadId> {
        self.thread_handle.as_ref().map(|h| h.thread().id())
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.as_ref().map_or(false, |h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::engine::scheduler::JobScheduler;
    use crate::engine::task::FnBatch;
    use std::sync::mpsc::channel;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_workers_are_named() {
        let config = Config::new().with_thread_count(3).with_thread_name_prefix("sim-");
        let scheduler = JobScheduler::new(&config).unwrap();
        let (tx, rx) = channel();
        let tx = parking_lot::Mutex::new(tx);

        let batch = FnBatch::new("names", 30, move |_, worker_id| {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            let _ = tx.lock().send((worker_id, name));
            Ok(())
        });
        scheduler.submit(Arc::new(batch)).unwrap();

        for _ in 0..30 {
            let (worker_id, name) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
            assert!(worker_id < 3);
            assert_eq!(name, format!("sim-{}", worker_id));
        }
    }

    #[test]
    fn test_drop_joins_workers() {
        let config = Config::new().with_thread_count(2);
        let scheduler = JobScheduler::new(&config).unwrap();
        assert_eq!(scheduler.live_workers(), 2);
        drop(scheduler);
    }
}
