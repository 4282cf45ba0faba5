// Tue Jan 13 2026 - Alex

pub mod coordinator;
pub mod event;
pub mod phase;
pub mod pool;
pub mod world;
mod work;

pub use coordinator::PhaseOrchestrator;
pub use event::WaitHandle;
pub use phase::{PhaseSignal, PhaseToken};
pub use pool::{ListPool, PooledVec};
pub use world::{AgentUpdate, AgentWorld, TickReport};
