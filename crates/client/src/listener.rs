use cubeworld_common::{BlockAddress, CuboidAddress, EntityId, PassiveId};
use cubeworld_cuboid::CuboidData;
use cubeworld_kernel::{Creature, Entity, EventRecord, Passive};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Callbacks fired when the projected world a client presents changes.
///
/// Calls happen on the thread driving the projection, after each local
/// action and after each reconciled tick.
pub trait ProjectionListener: Send {
    fn cuboid_loaded(&mut self, _cuboid: &Arc<CuboidData>) {}
    fn cuboid_changed(&mut self, _cuboid: &Arc<CuboidData>, _blocks: &BTreeSet<BlockAddress>) {}
    fn cuboid_unloaded(&mut self, _address: CuboidAddress) {}
    fn entity_loaded(&mut self, _entity: &Arc<Entity>) {}
    fn entity_changed(&mut self, _previous: &Arc<Entity>, _current: &Arc<Entity>) {}
    fn entity_unloaded(&mut self, _id: EntityId) {}
    fn creature_loaded(&mut self, _creature: &Arc<Creature>) {}
    fn creature_changed(&mut self, _previous: &Arc<Creature>, _current: &Arc<Creature>) {}
    fn creature_unloaded(&mut self, _id: EntityId) {}
    fn passive_loaded(&mut self, _passive: &Arc<Passive>) {}
    fn passive_changed(&mut self, _previous: &Arc<Passive>, _current: &Arc<Passive>) {}
    fn passive_unloaded(&mut self, _id: PassiveId) {}
    fn event_posted(&mut self, _event: &EventRecord) {}
    fn tick_completed(&mut self, _tick: u64) {}
}

pub struct NullProjectionListener;

impl ProjectionListener for NullProjectionListener {}

/// Counts callbacks. Handy for tooling and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionCounters {
    pub cuboids_loaded: usize,
    pub blocks_changed: usize,
    pub cuboids_unloaded: usize,
    pub entities_loaded: usize,
    pub entities_changed: usize,
    pub entities_unloaded: usize,
    pub creatures_loaded: usize,
    pub creatures_changed: usize,
    pub creatures_unloaded: usize,
    pub passives_loaded: usize,
    pub passives_changed: usize,
    pub passives_unloaded: usize,
    pub events: usize,
    pub ticks: usize,
}

/// A listener that tallies into shared counters.
#[derive(Clone, Default)]
pub struct CountingListener {
    pub counters: Arc<parking_lot::Mutex<ProjectionCounters>>,
}

impl ProjectionListener for CountingListener {
    fn cuboid_loaded(&mut self, _cuboid: &Arc<CuboidData>) {
        self.counters.lock().cuboids_loaded += 1;
    }
    fn cuboid_changed(&mut self, _cuboid: &Arc<CuboidData>, blocks: &BTreeSet<BlockAddress>) {
        self.counters.lock().blocks_changed += blocks.len();
    }
    fn cuboid_unloaded(&mut self, _address: CuboidAddress) {
        self.counters.lock().cuboids_unloaded += 1;
    }
    fn entity_loaded(&mut self, _entity: &Arc<Entity>) {
        self.counters.lock().entities_loaded += 1;
    }
    fn entity_changed(&mut self, _previous: &Arc<Entity>, _current: &Arc<Entity>) {
        self.counters.lock().entities_changed += 1;
    }
    fn entity_unloaded(&mut self, _id: EntityId) {
        self.counters.lock().entities_unloaded += 1;
    }
    fn creature_loaded(&mut self, _creature: &Arc<Creature>) {
        self.counters.lock().creatures_loaded += 1;
    }
    fn creature_changed(&mut self, _previous: &Arc<Creature>, _current: &Arc<Creature>) {
        self.counters.lock().creatures_changed += 1;
    }
    fn creature_unloaded(&mut self, _id: EntityId) {
        self.counters.lock().creatures_unloaded += 1;
    }
    fn passive_loaded(&mut self, _passive: &Arc<Passive>) {
        self.counters.lock().passives_loaded += 1;
    }
    fn passive_changed(&mut self, _previous: &Arc<Passive>, _current: &Arc<Passive>) {
        self.counters.lock().passives_changed += 1;
    }
    fn passive_unloaded(&mut self, _id: PassiveId) {
        self.counters.lock().passives_unloaded += 1;
    }
    fn event_posted(&mut self, _event: &EventRecord) {
        self.counters.lock().events += 1;
    }
    fn tick_completed(&mut self, _tick: u64) {
        self.counters.lock().ticks += 1;
    }
}
