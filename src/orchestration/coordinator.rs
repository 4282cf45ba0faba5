// Tue Jan 13 2026 - Alex

use crate::config::FrameBudget;
use crate::engine::error::SchedulerError;
use crate::engine::scheduler::JobScheduler;
use crate::engine::task::WorkBatch;
use crate::orchestration::phase::{PhaseSignal, PhaseToken};
use crate::orchestration::pool::ListPool;
use crate::orchestration::work::{AgentUnit, CollectErrands, CompilePickups, UpdateOffsetTables};
use crate::orchestration::world::{AgentWorld, TickReport};
use crate::utils::logging::ScopedTimer;
use std::sync::Arc;

/// Splits one tick of agent updates into background phases and collects the
/// results on the owner thread.
///
/// A tick is `start_update`, optionally `release_fetches`, then `end_update`.
/// The owner never blocks longer than the frame budget; units that miss it
/// are dropped for that tick.
pub struct PhaseOrchestrator<W: AgentWorld> {
    world: Arc<W>,
    scheduler: Arc<JobScheduler>,
    budget: Box<dyn FrameBudget>,
    pickup_phase: Arc<PhaseSignal>,
    fetch_phase: Arc<PhaseSignal>,
    units: Vec<Arc<AgentUnit<W>>>,
    pickup_pool: Arc<ListPool<W::Pickup>>,
    errand_pool: Arc<ListPool<W::Errand>>,
    next_agent: usize,
    fetches_released: bool,
    disposed: bool,
}

impl<W: AgentWorld> PhaseOrchestrator<W> {
    pub fn new(world: Arc<W>, scheduler: Arc<JobScheduler>, budget: Box<dyn FrameBudget>) -> Self {
        Self {
            world,
            scheduler,
            budget,
            pickup_phase: Arc::new(PhaseSignal::new("pickups")),
            fetch_phase: Arc::new(PhaseSignal::new("fetches")),
            units: Vec::with_capacity(8),
            pickup_pool: ListPool::new(),
            errand_pool: ListPool::new(),
            next_agent: 0,
            fetches_released: false,
            disposed: false,
        }
    }

    /// Picks this tick's agents and queues the offset table and pickup
    /// phases. Returns the number of agents being updated.
    pub fn start_update(&mut self) -> Result<usize, SchedulerError> {
        if self.disposed {
            return Err(SchedulerError::Disposed);
        }

        if !self.units.is_empty() {
            log::warn!("{} pickup collection jobs did not finish in time!", self.units.len());
            self.cleanup();
        }
        self.fetches_released = false;

        let agents = self.select_agents();
        if agents.is_empty() {
            return Ok(0);
        }

        let groups = self.world.pickup_group_count();
        for agent in agents {
            self.world.prepare_agent(&agent);
            self.units.push(Arc::new(AgentUnit::new(agent, groups, &self.pickup_pool, &self.errand_pool)));
        }

        let token = self.pickup_phase.begin(self.units.len());
        let mut batches: Vec<Arc<dyn WorkBatch>> = Vec::with_capacity(self.units.len() + 1);
        batches.push(Arc::new(UpdateOffsetTables::new(
            self.world.clone(),
            groups,
            self.pickup_phase.clone(),
            token,
        )));
        for unit in &self.units {
            batches.push(Arc::new(CompilePickups::new(
                self.world.clone(),
                unit.clone(),
                self.pickup_phase.clone(),
                token,
            )));
        }

        for batch in batches {
            if let Err(e) = self.scheduler.submit(batch) {
                self.abandon_tick(token);
                return Err(e);
            }
        }

        log::debug!("Queued pickup compilation for {} agents over {} groups", self.units.len(), groups);
        Ok(self.units.len())
    }

    /// Queues errand collection for every agent started this tick.
    pub fn release_fetches(&mut self) -> Result<(), SchedulerError> {
        if self.units.is_empty() || self.fetches_released {
            return Ok(());
        }

        let token = self.fetch_phase.begin(1);
        let batch = CollectErrands::new(self.world.clone(), self.units.clone(), self.fetch_phase.clone(), token);
        self.scheduler.submit(Arc::new(batch))?;
        self.fetches_released = true;
        Ok(())
    }

    /// Waits (bounded) for this tick's phases and returns what finished.
    pub fn end_update(&mut self) -> TickReport<W> {
        let mut report = TickReport::empty();
        if self.units.is_empty() {
            return report;
        }

        let timeout = self.budget.phase_timeout();
        let mut missed = Vec::new();
        {
            let _timer = ScopedTimer::new("pickup phase wait");
            if !self.pickup_phase.wait(timeout) {
                missed.push(self.pickup_phase.name());
            }
        }
        if self.fetches_released {
            let _timer = ScopedTimer::new("fetch phase wait");
            if !self.fetch_phase.wait(timeout) {
                missed.push(self.fetch_phase.name());
            }
        }
        report.timed_out = !missed.is_empty();

        let errands_expected = self.fetches_released;
        for unit in self.units.drain(..) {
            let update = if unit.is_finished(errands_expected) {
                unit.take_update()
            } else {
                None
            };

            match update {
                Some(update) => report.updates.push(update),
                None => {
                    unit.dispose();
                    report.discarded += 1;
                }
            }
        }
        self.fetches_released = false;

        if report.timed_out {
            log::warn!(
                "Agent updates missed the {:?} frame budget waiting on {}: {} finished, {} discarded",
                self.budget.max_timeout(),
                missed.join(" and "),
                report.updates.len(),
                report.discarded
            );
        }

        report
    }

    /// Releases any waiter and every pooled buffer still held.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pickup_phase.release();
        self.fetch_phase.release();
        self.cleanup();
    }

    pub fn pending_units(&self) -> usize {
        self.units.len()
    }

    /// Pooled buffers currently handed out to units.
    pub fn outstanding_buffers(&self) -> usize {
        self.pickup_pool.outstanding() + self.errand_pool.outstanding()
    }

    pub fn world(&self) -> &Arc<W> {
        &self.world
    }

    fn select_agents(&mut self) -> Vec<Arc<W::Agent>> {
        let n = self.world.agent_count();
        let mut selected = Vec::new();
        if n == 0 {
            return selected;
        }

        let mut index = self.next_agent % n;
        for _ in 0..self.world.probe_count() {
            if let Some(agent) = self.world.running_agent(index) {
                selected.push(agent);
            }
            index = (index + 1) % n;
        }
        self.next_agent = index;

        selected
    }

    fn abandon_tick(&mut self, token: PhaseToken) {
        self.pickup_phase.finish(token);
        self.cleanup();
    }

    fn cleanup(&mut self) {
        for unit in self.units.drain(..) {
            unit.dispose();
        }
    }
}

impl<W: AgentWorld> Drop for PhaseOrchestrator<W> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::report::testing::RecordingReporter;
    use crate::orchestration::event::WaitHandle;
    use parking_lot::Mutex;
    use std::cmp::Ordering as CmpOrdering;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    struct GridWorld {
        agents: Vec<Option<Arc<u32>>>,
        probe: usize,
        groups: usize,
        delay: Duration,
        fail_group: Option<usize>,
        gate: Option<Arc<WaitHandle>>,
        offset_updates: AtomicUsize,
        prepared: Mutex<Vec<u32>>,
    }

    impl GridWorld {
        fn new(agents: usize, groups: usize) -> Self {
            Self {
                agents: (0..agents as u32).map(|a| Some(Arc::new(a))).collect(),
                probe: agents,
                groups,
                delay: Duration::ZERO,
                fail_group: None,
                gate: None,
                offset_updates: AtomicUsize::new(0),
                prepared: Mutex::new(Vec::new()),
            }
        }
    }

    impl AgentWorld for GridWorld {
        type Agent = u32;
        type Pickup = (u32, usize);
        type Errand = u32;

        fn agent_count(&self) -> usize {
            self.agents.len()
        }

        fn running_agent(&self, slot: usize) -> Option<Arc<u32>> {
            self.agents.get(slot).cloned().flatten()
        }

        fn probe_count(&self) -> usize {
            self.probe
        }

        fn prepare_agent(&self, agent: &u32) {
            self.prepared.lock().push(*agent);
        }

        fn pickup_group_count(&self) -> usize {
            self.groups
        }

        fn update_offset_table(&self, _group: usize) -> anyhow::Result<()> {
            self.offset_updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn collect_pickups(&self, group: usize, agent: &u32, out: &mut Vec<(u32, usize)>) -> anyhow::Result<()> {
            if let Some(gate) = &self.gate {
                gate.wait_timeout(Duration::from_secs(10));
            }
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if self.fail_group == Some(group) {
                anyhow::bail!("group {} unreachable", group);
            }
            out.push((*agent, group));
            Ok(())
        }

        fn compare_pickups(&self, a: &(u32, usize), b: &(u32, usize)) -> CmpOrdering {
            b.1.cmp(&a.1)
        }

        fn collect_errands(&self, agent: &u32, out: &mut Vec<u32>) -> anyhow::Result<()> {
            out.extend((0..3).rev().map(|i| agent * 10 + i));
            Ok(())
        }
    }

    fn scheduler(threads: usize) -> (Arc<JobScheduler>, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let config = Config::new().with_thread_count(threads);
        let scheduler = JobScheduler::with_reporter(&config, reporter.clone()).unwrap();
        (Arc::new(scheduler), reporter)
    }

    fn orchestrator(world: GridWorld, scheduler: &Arc<JobScheduler>, budget: Duration) -> PhaseOrchestrator<GridWorld> {
        PhaseOrchestrator::new(Arc::new(world), scheduler.clone(), Box::new(budget))
    }

    fn settles(check: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !check() {
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    fn agent_ids(report: &TickReport<GridWorld>) -> Vec<u32> {
        report.updates.iter().map(|u| *u.agent).collect()
    }

    #[test]
    fn test_full_tick_merges_every_agent() {
        let (sched, _) = scheduler(2);
        let mut orch = orchestrator(GridWorld::new(3, 4), &sched, Duration::from_secs(10));

        assert_eq!(orch.start_update().unwrap(), 3);
        assert_eq!(orch.pending_units(), 3);
        orch.release_fetches().unwrap();
        let report = orch.end_update();

        assert!(report.is_complete());
        assert_eq!(agent_ids(&report), vec![0, 1, 2]);
        for update in &report.updates {
            let a = *update.agent;
            assert_eq!(*update.pickups, vec![(a, 3), (a, 2), (a, 1), (a, 0)]);
            assert_eq!(*update.errands, vec![a * 10, a * 10 + 1, a * 10 + 2]);
        }

        assert_eq!(orch.world().offset_updates.load(Ordering::SeqCst), 4);
        assert_eq!(*orch.world().prepared.lock(), vec![0, 1, 2]);
        assert_eq!(orch.pending_units(), 0);

        // Results live in pooled buffers until the report is dropped.
        assert_eq!(orch.outstanding_buffers(), 6);
        drop(report);
        assert_eq!(orch.outstanding_buffers(), 0);
    }

    #[test]
    fn test_steady_ticks_reuse_pooled_buffers() {
        let (sched, _) = scheduler(2);
        let mut orch = orchestrator(GridWorld::new(3, 4), &sched, Duration::from_secs(10));

        let tick = |orch: &mut PhaseOrchestrator<GridWorld>| {
            orch.start_update().unwrap();
            orch.release_fetches().unwrap();
            let report = orch.end_update();
            assert_eq!(report.updates.len(), 3);
        };

        tick(&mut orch);
        assert!(orch.pickup_pool.idle() + orch.errand_pool.idle() > 0);

        // Per tick: two result lists and a merge list per unit, one staged
        // list per group per unit, one scratch list per worker.
        let peak = 3 * 3 + 3 * 4 + 2;
        for _ in 0..20 {
            tick(&mut orch);
            assert_eq!(orch.outstanding_buffers(), 0);
            assert!(orch.pickup_pool.idle() + orch.errand_pool.idle() <= peak);
        }
    }

    #[test]
    fn test_agents_selected_round_robin() {
        let (sched, _) = scheduler(2);
        let mut world = GridWorld::new(5, 1);
        world.agents[3] = None;
        world.probe = 2;
        let mut orch = orchestrator(world, &sched, Duration::from_secs(10));

        let tick = |orch: &mut PhaseOrchestrator<GridWorld>| {
            orch.start_update().unwrap();
            let report = orch.end_update();
            assert!(report.updates.iter().all(|u| u.errands.is_empty()));
            agent_ids(&report)
        };

        assert_eq!(tick(&mut orch), vec![0, 1]);
        assert_eq!(tick(&mut orch), vec![2]);
        assert_eq!(tick(&mut orch), vec![4, 0]);
        assert_eq!(tick(&mut orch), vec![1, 2]);
    }

    #[test]
    fn test_no_agents_is_a_no_op() {
        let (sched, _) = scheduler(1);
        let mut orch = orchestrator(GridWorld::new(0, 3), &sched, Duration::from_secs(10));

        assert_eq!(orch.start_update().unwrap(), 0);
        orch.release_fetches().unwrap();
        let report = orch.end_update();
        assert_eq!(report.total_units(), 0);
        assert_eq!(sched.pending_batches(), 0);
    }

    #[test]
    fn test_timeouts_do_not_leak_buffers() {
        let (sched, _) = scheduler(2);
        let mut world = GridWorld::new(2, 2);
        world.delay = Duration::from_millis(30);
        let mut orch = orchestrator(world, &sched, Duration::from_millis(10));

        for _ in 0..8 {
            assert_eq!(orch.start_update().unwrap(), 2);
            orch.release_fetches().unwrap();

            let started = Instant::now();
            let report = orch.end_update();
            assert!(started.elapsed() < Duration::from_secs(2));

            assert!(report.timed_out);
            assert!(report.updates.is_empty());
            assert_eq!(report.discarded, 2);
            // Only scratch lists of items still running remain, one per worker.
            assert!(orch.outstanding_buffers() <= 2, "{} buffers held", orch.outstanding_buffers());
        }

        drop(orch);
        drop(sched);
    }

    #[test]
    fn test_uncollected_tick_is_cleaned_up() {
        let (sched, _) = scheduler(2);
        let gate = Arc::new(WaitHandle::new());
        let mut world = GridWorld::new(2, 2);
        world.gate = Some(gate.clone());
        let mut orch = orchestrator(world, &sched, Duration::from_secs(10));

        orch.start_update().unwrap();
        assert!(orch.outstanding_buffers() >= 4);

        orch.start_update().unwrap();
        assert_eq!(orch.pending_units(), 2);

        gate.set();
        orch.release_fetches().unwrap();
        let report = orch.end_update();
        assert!(report.is_complete());
        assert_eq!(report.updates.len(), 2);
        drop(report);
        assert_eq!(orch.outstanding_buffers(), 0);
    }

    #[test]
    fn test_scheduler_dispose_releases_waiting_owner() {
        let (sched, _) = scheduler(1);
        let gate = Arc::new(WaitHandle::new());
        let mut world = GridWorld::new(2, 1);
        world.gate = Some(gate.clone());
        let mut orch = orchestrator(world, &sched, Duration::from_secs(10));

        orch.start_update().unwrap();
        sched.dispose();

        let started = Instant::now();
        let report = orch.end_update();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!report.timed_out);
        assert_eq!(report.discarded, 2);

        assert!(matches!(orch.start_update(), Err(SchedulerError::Disposed)));
        assert_eq!(orch.pending_units(), 0);

        gate.set();
        assert!(settles(|| orch.outstanding_buffers() == 0));
        drop(orch);
        drop(sched);
    }

    #[test]
    fn test_group_fault_keeps_other_results() {
        let (sched, reporter) = scheduler(2);
        let mut world = GridWorld::new(1, 4);
        world.fail_group = Some(1);
        let mut orch = orchestrator(world, &sched, Duration::from_secs(10));

        orch.start_update().unwrap();
        orch.release_fetches().unwrap();
        let report = orch.end_update();

        assert_eq!(report.updates.len(), 1);
        assert_eq!(*report.updates[0].pickups, vec![(0, 3), (0, 2), (0, 0)]);

        drop(orch);
        drop(sched);
        let faults = reporter.faults.lock();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].contains("group 1 unreachable"));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (sched, _) = scheduler(1);
        let mut orch = orchestrator(GridWorld::new(2, 2), &sched, Duration::from_secs(10));

        orch.start_update().unwrap();
        orch.dispose();
        orch.dispose();
        assert_eq!(orch.pending_units(), 0);
        assert!(settles(|| orch.outstanding_buffers() == 0));
        assert!(orch.release_fetches().is_ok());
        assert_eq!(orch.end_update().total_units(), 0);
    }
}
