// Tue Jan 13 2026 - Alex

use crate::orchestration::pool::PooledVec;
use std::cmp::Ordering;
use std::sync::Arc;

/// Whatever owns agent state. Implementations are shared with worker
/// threads, so the collect/update methods run concurrently.
pub trait AgentWorld: Send + Sync + 'static {
    type Agent: Send + Sync + 'static;
    type Pickup: Send + 'static;
    type Errand: Ord + Send + 'static;

    /// Number of agent slots visited by the round-robin cursor.
    fn agent_count(&self) -> usize;

    /// The agent in `slot`, or `None` if it is not currently running.
    fn running_agent(&self, slot: usize) -> Option<Arc<Self::Agent>>;

    /// How many slots to visit per tick.
    fn probe_count(&self) -> usize;

    /// Owner-thread hook run for each selected agent before any work is queued.
    fn prepare_agent(&self, _agent: &Self::Agent) {}

    fn pickup_group_count(&self) -> usize;

    fn update_offset_table(&self, group: usize) -> anyhow::Result<()>;

    fn collect_pickups(&self, group: usize, agent: &Self::Agent, out: &mut Vec<Self::Pickup>) -> anyhow::Result<()>;

    fn compare_pickups(&self, a: &Self::Pickup, b: &Self::Pickup) -> Ordering;

    fn collect_errands(&self, agent: &Self::Agent, out: &mut Vec<Self::Errand>) -> anyhow::Result<()>;
}

/// One agent's results for a tick. The lists are pooled and go back to the
/// orchestrator's pools when the update is dropped.
pub struct AgentUpdate<W: AgentWorld> {
    pub agent: Arc<W::Agent>,
    pub pickups: PooledVec<W::Pickup>,
    pub errands: PooledVec<W::Errand>,
}

pub struct TickReport<W: AgentWorld> {
    pub updates: Vec<AgentUpdate<W>>,
    pub discarded: usize,
    pub timed_out: bool,
}

impl<W: AgentWorld> TickReport<W> {
    pub fn empty() -> Self {
        Self {
            updates: Vec::new(),
            discarded: 0,
            timed_out: false,
        }
    }

    pub fn total_units(&self) -> usize {
        self.updates.len() + self.discarded
    }

    pub fn is_complete(&self) -> bool {
        self.discarded == 0 && !self.timed_out
    }
}

impl<W: AgentWorld> Default for TickReport<W> {
    fn default() -> Self {
        Self::empty()
    }
}
