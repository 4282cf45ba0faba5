// Tue Jan 13 2026 - Alex

use crate::engine::task::{WorkBatch, WorkItemCollection};
use crate::orchestration::phase::{PhaseSignal, PhaseToken};
use crate::orchestration::pool::{ListPool, PooledVec};
use crate::orchestration::world::{AgentUpdate, AgentWorld};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct UnitBuffers<W: AgentWorld> {
    pickups: PooledVec<W::Pickup>,
    errands: PooledVec<W::Errand>,
}

/// Per-agent state for one tick. Buffers are taken exactly once, either when
/// the owner merges the results or when it disposes the unit.
pub(crate) struct AgentUnit<W: AgentWorld> {
    agent: Arc<W::Agent>,
    pickup_pool: Arc<ListPool<W::Pickup>>,
    errand_pool: Arc<ListPool<W::Errand>>,
    staging: Vec<Mutex<Option<PooledVec<W::Pickup>>>>,
    buffers: Mutex<Option<UnitBuffers<W>>>,
    pickups_ready: AtomicBool,
    errands_ready: AtomicBool,
}

impl<W: AgentWorld> AgentUnit<W> {
    pub(crate) fn new(
        agent: Arc<W::Agent>,
        groups: usize,
        pickup_pool: &Arc<ListPool<W::Pickup>>,
        errand_pool: &Arc<ListPool<W::Errand>>,
    ) -> Self {
        Self {
            agent,
            pickup_pool: pickup_pool.clone(),
            errand_pool: errand_pool.clone(),
            staging: (0..groups).map(|_| Mutex::new(None)).collect(),
            buffers: Mutex::new(Some(UnitBuffers {
                pickups: pickup_pool.allocate(),
                errands: errand_pool.allocate(),
            })),
            pickups_ready: AtomicBool::new(false),
            errands_ready: AtomicBool::new(false),
        }
    }

    fn is_disposed(&self) -> bool {
        self.buffers.lock().is_none()
    }

    pub(crate) fn is_finished(&self, errands_expected: bool) -> bool {
        self.pickups_ready.load(Ordering::Acquire)
            && (!errands_expected || self.errands_ready.load(Ordering::Acquire))
    }

    /// Releases the pooled buffers. Returns false if they were already gone.
    pub(crate) fn dispose(&self) -> bool {
        let released = self.buffers.lock().take().is_some();
        for slot in &self.staging {
            slot.lock().take();
        }
        released
    }

    pub(crate) fn take_update(&self) -> Option<AgentUpdate<W>> {
        let UnitBuffers { pickups, errands } = self.buffers.lock().take()?;

        Some(AgentUpdate {
            agent: self.agent.clone(),
            pickups,
            errands,
        })
    }

    fn stage_pickups(&self, group: usize, pickups: PooledVec<W::Pickup>) {
        let mut slot = self.staging[group].lock();
        if !self.is_disposed() {
            *slot = Some(pickups);
        }
    }

    fn finish_pickups(&self, world: &W) {
        if self.is_disposed() {
            for slot in &self.staging {
                slot.lock().take();
            }
            self.pickups_ready.store(true, Ordering::Release);
            return;
        }

        // Slot locks are never taken while holding the buffers lock.
        let mut merged = self.pickup_pool.allocate();
        for slot in &self.staging {
            if let Some(mut staged) = slot.lock().take() {
                merged.append(&mut staged);
            }
        }
        merged.sort_by(|a, b| world.compare_pickups(a, b));

        if let Some(buffers) = self.buffers.lock().as_mut() {
            std::mem::swap(&mut buffers.pickups, &mut merged);
        }
        self.pickups_ready.store(true, Ordering::Release);
    }

    fn store_errands(&self, mut errands: PooledVec<W::Errand>) {
        errands.sort();
        if let Some(buffers) = self.buffers.lock().as_mut() {
            std::mem::swap(&mut buffers.errands, &mut errands);
        }
        self.errands_ready.store(true, Ordering::Release);
    }
}

/// Refreshes every pickup group's reachability table before agents read them.
pub(crate) struct UpdateOffsetTables<W: AgentWorld> {
    world: Arc<W>,
    groups: usize,
    phase: Arc<PhaseSignal>,
    token: PhaseToken,
}

impl<W: AgentWorld> UpdateOffsetTables<W> {
    pub(crate) fn new(world: Arc<W>, groups: usize, phase: Arc<PhaseSignal>, token: PhaseToken) -> Self {
        Self { world, groups, phase, token }
    }
}

impl<W: AgentWorld> WorkItemCollection for UpdateOffsetTables<W> {
    fn count(&self) -> usize {
        self.groups
    }

    fn execute_item(&self, index: usize, _worker_id: usize) -> anyhow::Result<()> {
        self.world.update_offset_table(index)
    }
}

impl<W: AgentWorld> WorkBatch for UpdateOffsetTables<W> {
    fn items(&self) -> &dyn WorkItemCollection {
        self
    }

    fn name(&self) -> &str {
        "offset tables"
    }

    fn on_abort(&self) {
        self.phase.finish(self.token);
    }
}

/// Gathers one agent's reachable pickups across all groups.
pub(crate) struct CompilePickups<W: AgentWorld> {
    world: Arc<W>,
    unit: Arc<AgentUnit<W>>,
    phase: Arc<PhaseSignal>,
    token: PhaseToken,
}

impl<W: AgentWorld> CompilePickups<W> {
    pub(crate) fn new(world: Arc<W>, unit: Arc<AgentUnit<W>>, phase: Arc<PhaseSignal>, token: PhaseToken) -> Self {
        Self { world, unit, phase, token }
    }
}

impl<W: AgentWorld> WorkItemCollection for CompilePickups<W> {
    fn count(&self) -> usize {
        self.unit.staging.len()
    }

    fn execute_item(&self, index: usize, _worker_id: usize) -> anyhow::Result<()> {
        if self.unit.is_disposed() {
            return Ok(());
        }

        let mut pickups = self.unit.pickup_pool.allocate();
        let result = self.world.collect_pickups(index, &self.unit.agent, &mut pickups);
        self.unit.stage_pickups(index, pickups);
        result
    }
}

impl<W: AgentWorld> WorkBatch for CompilePickups<W> {
    fn items(&self) -> &dyn WorkItemCollection {
        self
    }

    fn name(&self) -> &str {
        "compile pickups"
    }

    fn on_complete(&self) {
        self.unit.finish_pickups(&self.world);
        self.phase.unit_done(self.token);
    }

    fn on_abort(&self) {
        self.phase.finish(self.token);
    }
}

/// Collects and sorts the errands of every unit queued this tick.
pub(crate) struct CollectErrands<W: AgentWorld> {
    world: Arc<W>,
    units: Vec<Arc<AgentUnit<W>>>,
    phase: Arc<PhaseSignal>,
    token: PhaseToken,
}

impl<W: AgentWorld> CollectErrands<W> {
    pub(crate) fn new(world: Arc<W>, units: Vec<Arc<AgentUnit<W>>>, phase: Arc<PhaseSignal>, token: PhaseToken) -> Self {
        Self { world, units, phase, token }
    }
}

impl<W: AgentWorld> WorkItemCollection for CollectErrands<W> {
    fn count(&self) -> usize {
        self.units.len()
    }

    fn execute_item(&self, index: usize, _worker_id: usize) -> anyhow::Result<()> {
        let unit = &self.units[index];
        if unit.is_disposed() {
            return Ok(());
        }

        let mut errands = unit.errand_pool.allocate();
        let result = self.world.collect_errands(&unit.agent, &mut errands);
        unit.store_errands(errands);
        result
    }
}

impl<W: AgentWorld> WorkBatch for CollectErrands<W> {
    fn items(&self) -> &dyn WorkItemCollection {
        self
    }

    fn name(&self) -> &str {
        "collect errands"
    }

    fn on_complete(&self) {
        self.phase.unit_done(self.token);
    }

    fn on_abort(&self) {
        self.phase.finish(self.token);
    }
}
