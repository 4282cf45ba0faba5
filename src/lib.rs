// Tue Jan 15 2026 - Alex

pub mod config;
pub mod demo;
pub mod engine;
pub mod orchestration;
pub mod utils;

pub use config::{Config, ConfigError, FrameBudget};
pub use demo::DemoWorld;
pub use engine::{JobScheduler, SchedulerError, WorkBatch, WorkItemCollection};
pub use orchestration::{AgentUpdate, AgentWorld, PhaseOrchestrator, TickReport};
