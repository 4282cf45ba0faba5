// Tue Jan 13 2026 - Alex

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("job scheduler has been disposed")]
    Disposed,
    #[error("failed to spawn worker thread {0}: {1}")]
    Spawn(String, #[source] std::io::Error),
}
