// Tue Jan 13 2026 - Alex

use crate::engine::task::ItemFault;

/// Receives per-item faults and scheduler warnings. Observational only.
///
/// `report_fault` runs while the scheduler holds its queue lock, so a
/// reporter must not call back into `JobScheduler::submit` or `dispose`.
pub trait FaultReporter: Send + Sync {
    fn report_fault(&self, fault: &ItemFault);

    fn warn(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report_fault(&self, fault: &ItemFault) {
        log::error!("{}", fault.message());
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }
}
