// Tue Jan 13 2026 - Alex

use crate::config::Config;
use crate::engine::error::SchedulerError;
use crate::engine::report::{FaultReporter, LogReporter};
use crate::engine::semaphore::Semaphore;
use crate::engine::task::{panic_message, ItemFault, WorkBatch};
use crate::engine::worker::Worker;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Runs one batch at a time across a fixed pool of workers.
///
/// Batches are activated in submission order. The worker that finishes last
/// completes the current batch and activates the next one, so `on_complete`
/// of a batch always returns before `on_start` of its successor.
pub struct JobScheduler {
    shared: Arc<SchedulerShared>,
    workers: Mutex<Vec<Worker>>,
}

pub(crate) struct SchedulerShared {
    thread_count: usize,
    // Head of the queue is the active batch while one is running.
    queue: Mutex<VecDeque<Arc<dyn WorkBatch>>>,
    active: RwLock<Option<Arc<dyn WorkBatch>>>,
    next_index: AtomicUsize,
    active_workers: AtomicUsize,
    semaphore: Semaphore,
    disposed: AtomicBool,
    faults: Vec<Mutex<Vec<ItemFault>>>,
    reporter: Arc<dyn FaultReporter>,
}

impl JobScheduler {
    pub fn new(config: &Config) -> Result<Self, SchedulerError> {
        Self::with_reporter(config, Arc::new(LogReporter))
    }

    pub fn with_reporter(config: &Config, reporter: Arc<dyn FaultReporter>) -> Result<Self, SchedulerError> {
        let thread_count = config.effective_threads();

        let shared = Arc::new(SchedulerShared {
            thread_count,
            queue: Mutex::new(VecDeque::new()),
            active: RwLock::new(None),
            next_index: AtomicUsize::new(0),
            active_workers: AtomicUsize::new(0),
            semaphore: Semaphore::new(0, thread_count),
            disposed: AtomicBool::new(false),
            faults: (0..thread_count).map(|_| Mutex::new(Vec::with_capacity(4))).collect(),
            reporter,
        });

        let scheduler = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(thread_count)),
        };

        for id in 0..thread_count {
            let name = format!("{}{}", config.thread_name_prefix, id);
            let worker = Worker::spawn(id, name, scheduler.shared.clone())?;
            scheduler.workers.lock().push(worker);
        }

        log::debug!("Job scheduler started with {} workers", thread_count);
        Ok(scheduler)
    }

    /// Queues a batch and returns immediately. The batch starts right away
    /// when nothing else is queued.
    pub fn submit(&self, batch: Arc<dyn WorkBatch>) -> Result<(), SchedulerError> {
        let starting = {
            let mut queue = self.shared.queue.lock();
            if self.shared.disposed.load(Ordering::SeqCst) {
                return Err(SchedulerError::Disposed);
            }

            let starting = queue.is_empty();
            queue.push_back(batch.clone());
            if starting {
                self.shared.prepare(batch.clone());
            }
            starting
        };

        if starting {
            self.shared.start(&batch);
        }

        Ok(())
    }

    /// Aborts every queued batch that has not started. An active batch runs
    /// to completion; workers exit once nothing is active.
    pub fn dispose(&self) {
        let (aborted, idle) = {
            let mut queue = self.shared.queue.lock();
            if self.shared.disposed.swap(true, Ordering::SeqCst) {
                return;
            }

            let active = self.shared.active.read().is_some();
            let keep = if active { queue.len().min(1) } else { 0 };
            let aborted: Vec<_> = queue.drain(keep..).collect();
            (aborted, !active)
        };

        log::debug!("Disposing job scheduler, aborting {} queued batches", aborted.len());

        for batch in &aborted {
            self.shared.guarded(batch.as_ref(), "abort", || batch.on_abort());
        }

        if idle {
            self.shared.semaphore.release(self.shared.thread_count);
        }
    }

    pub fn thread_count(&self) -> usize {
        self.shared.thread_count
    }

    /// Queued batches, including the one currently running.
    pub fn pending_batches(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    pub fn live_workers(&self) -> usize {
        self.workers.lock().iter().filter(|w| w.is_running()).count()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.dispose();

        let current = thread::current().id();
        let workers = self.workers.get_mut();
        if workers.iter().any(|w| w.thread_id() == Some(current)) {
            // Dropped from a callback: the barrier worker wakes the rest once
            // the active batch completes, so the handles are detached instead.
            log::debug!("Job scheduler dropped on a worker thread, detaching {} workers", workers.len());
            workers.clear();
            return;
        }

        for worker in workers.iter_mut() {
            worker.join();
        }
    }
}

enum Advance {
    Next(Arc<dyn WorkBatch>),
    Idle,
    Exit(Vec<Arc<dyn WorkBatch>>, Vec<ItemFault>),
}

impl SchedulerShared {
    fn prepare(&self, batch: Arc<dyn WorkBatch>) {
        self.next_index.store(0, Ordering::SeqCst);
        self.active_workers.store(self.thread_count, Ordering::SeqCst);
        *self.active.write() = Some(batch);
    }

    fn start(&self, batch: &Arc<dyn WorkBatch>) {
        log::trace!("Activating {} with {} items", batch.name(), batch.items().count());
        self.guarded(batch.as_ref(), "start", || batch.on_start());
        self.semaphore.release(self.thread_count);
    }

    pub(crate) fn wait_for_work(&self) {
        self.semaphore.acquire();
    }

    pub(crate) fn active_batch(&self) -> Option<Arc<dyn WorkBatch>> {
        self.active.read().clone()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Claims the next index of `batch` and runs it. Returns false once the
    /// batch has no unclaimed items left.
    pub(crate) fn do_next_item(&self, batch: &dyn WorkBatch, worker_id: usize) -> bool {
        let index = self.next_index.fetch_add(1, Ordering::AcqRel);
        let items = batch.items();
        if index >= items.count() {
            return false;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| items.execute_item(index, worker_id))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                self.record_fault(worker_id, ItemFault::new(batch.name(), index, worker_id, error));
            }
            Err(payload) => {
                self.record_fault(worker_id, ItemFault::from_panic(batch.name(), index, worker_id, payload));
            }
        }

        true
    }

    fn record_fault(&self, worker_id: usize, fault: ItemFault) {
        if let Some(faults) = self.faults.get(worker_id) {
            faults.lock().push(fault);
        }
    }

    /// Barrier: the last worker to report completes the batch and moves the
    /// queue forward.
    pub(crate) fn report_inactive(&self) {
        if self.active_workers.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        if let Some(finished) = self.active_batch() {
            self.guarded(finished.as_ref(), "complete", || finished.on_complete());
        }

        let advance = {
            let mut queue = self.queue.lock();
            queue.pop_front();

            if self.disposed.load(Ordering::SeqCst) {
                let aborted: Vec<_> = queue.drain(..).collect();
                *self.active.write() = None;
                Advance::Exit(aborted, self.take_faults())
            } else if let Some(next) = queue.front().cloned() {
                self.prepare(next.clone());
                Advance::Next(next)
            } else {
                *self.active.write() = None;
                // Flushed under the queue lock so no batch can start mid-report.
                self.flush_faults(&self.take_faults());
                Advance::Idle
            }
        };

        match advance {
            Advance::Next(next) => self.start(&next),
            Advance::Idle => {}
            Advance::Exit(aborted, faults) => {
                for batch in &aborted {
                    self.guarded(batch.as_ref(), "abort", || batch.on_abort());
                }
                self.flush_faults(&faults);
                self.semaphore.release(self.thread_count);
            }
        }
    }

    fn take_faults(&self) -> Vec<ItemFault> {
        let mut faults = Vec::new();
        for slot in &self.faults {
            faults.append(&mut slot.lock());
        }
        faults
    }

    fn flush_faults(&self, faults: &[ItemFault]) {
        for fault in faults {
            self.reporter.report_fault(fault);
        }
    }

    fn guarded<F: FnOnce()>(&self, batch: &dyn WorkBatch, stage: &str, f: F) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            self.reporter.warn(&format!(
                "{} {} callback panicked: {}",
                batch.name(),
                stage,
                panic_message(payload.as_ref())
            ));
        }
    }
}
