// Tue Jan 13 2026 - Alex

pub mod error;
pub mod report;
pub mod scheduler;
pub mod semaphore;
pub mod task;
pub mod worker;

pub use error::SchedulerError;
pub use report::{FaultReporter, LogReporter};
pub use scheduler::JobScheduler;
pub use semaphore::Semaphore;
pub use task::{FnBatch, ItemFault, WorkBatch, WorkItemCollection};
pub use worker::{Worker, WorkerState};
