// Tue Jan 13 2026 - Alex

use std::any::Any;
use std::fmt;

/// An indexable set of independent sub-tasks.
///
/// `execute_item` may run concurrently for distinct indices on distinct
/// workers, and is called at most once per index for each activation.
pub trait WorkItemCollection: Send + Sync {
    fn count(&self) -> usize;

    fn execute_item(&self, index: usize, worker_id: usize) -> anyhow::Result<()>;
}

/// A collection of items plus the callbacks the scheduler fires around it.
pub trait WorkBatch: Send + Sync {
    fn items(&self) -> &dyn WorkItemCollection;

    fn name(&self) -> &str {
        "batch"
    }

    /// Runs on the activating thread before any item of this batch.
    fn on_start(&self) {}

    /// Runs on the worker that closes the barrier, after the last item and
    /// before the next batch starts.
    fn on_complete(&self) {}

    /// Runs instead of `on_complete` when the batch was still queued at dispose.
    fn on_abort(&self) {}
}

pub struct ItemFault {
    pub batch: String,
    pub index: usize,
    pub worker_id: usize,
    pub error: anyhow::Error,
}

impl ItemFault {
    pub fn new(batch: &str, index: usize, worker_id: usize, error: anyhow::Error) -> Self {
        Self {
            batch: batch.to_string(),
            index,
            worker_id,
            error,
        }
    }

    pub fn from_panic(batch: &str, index: usize, worker_id: usize, payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        Self::new(batch, index, worker_id, anyhow::anyhow!("item panicked: {}", message))
    }

    pub fn message(&self) -> String {
        format!(
            "{} item {} failed on worker {}: {:#}",
            self.batch, self.index, self.worker_id, self.error
        )
    }
}

impl fmt::Debug for ItemFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemFault")
            .field("batch", &self.batch)
            .field("index", &self.index)
            .field("worker_id", &self.worker_id)
            .field("error", &self.error.to_string())
            .finish()
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Adapts a closure into a batch with no lifecycle hooks.
pub struct FnBatch<F> {
    name: String,
    count: usize,
    func: F,
}

impl<F> FnBatch<F>
where
    F: Fn(usize, usize) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: &str, count: usize, func: F) -> Self {
        Self {
            name: name.to_string(),
            count,
            func,
        }
    }
}

impl<F> WorkItemCollection for FnBatch<F>
where
    F: Fn(usize, usize) -> anyhow::Result<()> + Send + Sync,
{
    fn count(&self) -> usize {
        self.count
    }

    fn execute_item(&self, index: usize, worker_id: usize) -> anyhow::Result<()> {
        (self.func)(index, worker_id)
    }
}

impl<F> WorkBatch for FnBatch<F>
where
    F: Fn(usize, usize) -> anyhow::Result<()> + Send + Sync,
{
    fn items(&self) -> &dyn WorkItemCollection {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u32);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_fn_batch_dispatch() {
        let batch = FnBatch::new("double", 3, |index, _| {
            if index == 2 {
                anyhow::bail!("bad index {}", index);
            }
            Ok(())
        });

        assert_eq!(batch.name(), "double");
        assert_eq!(batch.items().count(), 3);
        assert!(batch.items().execute_item(0, 0).is_ok());
        assert!(batch.items().execute_item(2, 1).is_err());
    }

    #[test]
    fn test_fault_message() {
        let fault = ItemFault::new("paths", 4, 1, anyhow::anyhow!("no route"));
        assert_eq!(fault.message(), "paths item 4 failed on worker 1: no route");
    }

    #[test]
    fn test_fault_message_includes_context_once() {
        let error = anyhow::anyhow!("no route").context("planning group 3");
        let fault = ItemFault::new("paths", 0, 2, error);
        let message = fault.message();
        assert_eq!(message, "paths item 0 failed on worker 2: planning group 3: no route");
        assert_eq!(message.matches("no route").count(), 1);
    }
}
