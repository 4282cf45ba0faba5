// Tue Jan 13 2026 - Alex

use crate::orchestration::world::AgentWorld;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct DemoAgent {
    pub id: u32,
    pub home_group: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoPickup {
    pub group: usize,
    pub item: u32,
    pub distance: f32,
}

/// Synthetic world used by the CLI: a ring of pickup groups, with agents
/// spread around it. Each group/agent pair burns `work` of CPU time.
pub struct DemoWorld {
    agents: Vec<Option<Arc<DemoAgent>>>,
    probe_count: usize,
    groups: usize,
    items_per_group: u32,
    work: Duration,
    offsets: RwLock<Vec<u32>>,
    table_updates: AtomicU64,
}

impl DemoWorld {
    pub fn new(agents: usize, groups: usize) -> Self {
        let groups = groups.max(1);
        let agents = (0..agents)
            .map(|id| {
                // Every seventh slot is parked and skipped by the cursor.
                if id % 7 == 6 {
                    None
                } else {
                    Some(Arc::new(DemoAgent {
                        id: id as u32,
                        home_group: id % groups,
                    }))
                }
            })
            .collect::<Vec<_>>();

        Self {
            probe_count: agents.len().min(8),
            agents,
            groups,
            items_per_group: 4,
            work: Duration::from_micros(50),
            offsets: RwLock::new(vec![0; groups]),
            table_updates: AtomicU64::new(0),
        }
    }

    pub fn with_probe_count(mut self, probe_count: usize) -> Self {
        self.probe_count = probe_count;
        self
    }

    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn with_items_per_group(mut self, items: u32) -> Self {
        self.items_per_group = items;
        self
    }

    pub fn table_updates(&self) -> u64 {
        self.table_updates.load(AtomicOrdering::Relaxed)
    }

    fn burn(&self) {
        if self.work.is_zero() {
            return;
        }
        let start = Instant::now();
        while start.elapsed() < self.work {
            std::hint::spin_loop();
        }
    }

    fn ring_distance(&self, from: usize, to: usize) -> usize {
        let d = from.abs_diff(to);
        d.min(self.groups - d)
    }
}

impl AgentWorld for DemoWorld {
    type Agent = DemoAgent;
    type Pickup = DemoPickup;
    type Errand = u32;

    fn agent_count(&self) -> usize {
        self.agents.len()
    }

    fn running_agent(&self, slot: usize) -> Option<Arc<DemoAgent>> {
        self.agents.get(slot).cloned().flatten()
    }

    fn probe_count(&self) -> usize {
        self.probe_count
    }

    fn pickup_group_count(&self) -> usize {
        self.groups
    }

    fn update_offset_table(&self, group: usize) -> anyhow::Result<()> {
        self.burn();
        let mut offsets = self.offsets.write();
        let slot = offsets
            .get_mut(group)
            .ok_or_else(|| anyhow::anyhow!("no offset table for group {}", group))?;
        *slot = slot.wrapping_add(1);
        self.table_updates.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(())
    }

    fn collect_pickups(&self, group: usize, agent: &DemoAgent, out: &mut Vec<DemoPickup>) -> anyhow::Result<()> {
        self.burn();
        let offset = self.offsets.read().get(group).copied().unwrap_or(0);
        let base = self.ring_distance(agent.home_group, group) as f32;

        for item in 0..self.items_per_group {
            let jitter = ((offset + item + agent.id) % 5) as f32 * 0.1;
            out.push(DemoPickup {
                group,
                item,
                distance: base + jitter,
            });
        }
        Ok(())
    }

    fn compare_pickups(&self, a: &DemoPickup, b: &DemoPickup) -> Ordering {
        a.distance
            .total_cmp(&b.distance)
            .then(a.group.cmp(&b.group))
            .then(a.item.cmp(&b.item))
    }

    fn collect_errands(&self, agent: &DemoAgent, out: &mut Vec<u32>) -> anyhow::Result<()> {
        self.burn();
        let count = (agent.id % 3) + 1;
        out.extend((0..count).rev().map(|n| agent.id * 100 + n));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::JobScheduler;
    use crate::orchestration::PhaseOrchestrator;

    #[test]
    fn test_parked_slots_are_skipped() {
        let world = DemoWorld::new(8, 4);
        assert_eq!(world.agent_count(), 8);
        assert!(world.running_agent(6).is_none());
        assert_eq!(world.running_agent(7).map(|a| a.id), Some(7));
        assert!(world.running_agent(8).is_none());
    }

    #[test]
    fn test_pickups_sorted_nearest_first() {
        let world = DemoWorld::new(3, 6).with_work(Duration::ZERO);
        let agent = world.running_agent(2).unwrap();

        let mut pickups = Vec::new();
        for group in 0..world.pickup_group_count() {
            world.collect_pickups(group, &agent, &mut pickups).unwrap();
        }
        pickups.sort_by(|a, b| world.compare_pickups(a, b));

        assert_eq!(pickups.len(), 24);
        assert_eq!(pickups[0].group, 2);
        assert!(pickups.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_items_per_group() {
        let world = DemoWorld::new(2, 3).with_items_per_group(7).with_work(Duration::ZERO);
        let agent = world.running_agent(0).unwrap();

        let mut pickups = Vec::new();
        world.collect_pickups(1, &agent, &mut pickups).unwrap();
        assert_eq!(pickups.len(), 7);
        assert!(pickups.iter().all(|p| p.group == 1));
    }

    #[test]
    fn test_demo_ticks_through_scheduler() {
        let config = Config::new().with_thread_count(3);
        let scheduler = Arc::new(JobScheduler::new(&config).unwrap());
        let world = Arc::new(DemoWorld::new(10, 5).with_probe_count(4).with_work(Duration::ZERO));
        let mut orch = PhaseOrchestrator::new(world.clone(), scheduler, Box::new(Duration::from_secs(10)));

        let mut seen = Vec::new();
        for _ in 0..3 {
            orch.start_update().unwrap();
            orch.release_fetches().unwrap();
            let report = orch.end_update();
            assert!(report.is_complete());
            for update in report.updates {
                assert_eq!(update.pickups.len(), 20);
                assert!(update.errands.windows(2).all(|w| w[0] <= w[1]));
                seen.push(update.agent.id);
            }
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 7, 8, 9, 0, 1]);
        assert_eq!(world.table_updates(), 15);
    }
}
