use crate::entity::{Creature, Entity, Passive, RecordUpdate};
use crate::error::SnapshotError;
use crate::event::EventRecord;
use crate::mutation::BlockMutation;
use crate::reader::WorldReader;
use crate::scheduled::{CommittedAction, ScheduledAction, ScheduledMutation};
use crate::timing::TickStats;
use cubeworld_common::{CommitLevel, CuboidAddress, EntityId, PassiveId};
use cubeworld_cuboid::{CuboidData, CuboidUpdate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything the next tick starts from.
///
/// Records are shared `Arc`s: a tick that leaves a record alone carries the
/// same allocation forward.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub cuboids: BTreeMap<CuboidAddress, Arc<CuboidData>>,
    pub entities: BTreeMap<EntityId, Arc<Entity>>,
    pub creatures: BTreeMap<EntityId, Arc<Creature>>,
    pub passives: BTreeMap<PassiveId, Arc<Passive>>,
    pub pending_mutations: BTreeMap<CuboidAddress, Vec<ScheduledMutation>>,
    pub pending_actions: BTreeMap<EntityId, Vec<ScheduledAction>>,
    /// Highest client commit level consumed per entity.
    pub commit_levels: BTreeMap<EntityId, CommitLevel>,
    /// Creature ids count down from -1.
    pub next_creature_id: i32,
    pub next_passive_id: i32,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            cuboids: BTreeMap::new(),
            entities: BTreeMap::new(),
            creatures: BTreeMap::new(),
            passives: BTreeMap::new(),
            pending_mutations: BTreeMap::new(),
            pending_actions: BTreeMap::new(),
            commit_levels: BTreeMap::new(),
            next_creature_id: -1,
            next_passive_id: 1,
        }
    }
}

impl WorldReader for WorldState {
    fn cuboid(&self, address: CuboidAddress) -> Option<&CuboidData> {
        self.cuboids.get(&address).map(|cuboid| cuboid.as_ref())
    }
}

impl WorldState {
    pub fn commit_level(&self, entity: EntityId) -> CommitLevel {
        self.commit_levels
            .get(&entity)
            .copied()
            .unwrap_or(CommitLevel::NONE)
    }
}

/// What one tick changed, with superseded versions kept for listeners.
#[derive(Debug, Clone, Default)]
pub struct TickChanges {
    pub loaded_cuboids: Vec<CuboidAddress>,
    pub unloaded_cuboids: Vec<CuboidAddress>,
    pub loaded_entities: Vec<EntityId>,
    pub unloaded_entities: Vec<EntityId>,
    pub cuboid_updates: BTreeMap<CuboidAddress, CuboidUpdate>,
    pub entity_updates: BTreeMap<EntityId, RecordUpdate<Entity>>,
    pub creature_updates: BTreeMap<EntityId, RecordUpdate<Creature>>,
    pub spawned_creatures: Vec<EntityId>,
    pub despawned_creatures: Vec<EntityId>,
    pub passive_updates: BTreeMap<PassiveId, RecordUpdate<Passive>>,
    pub spawned_passives: Vec<PassiveId>,
    pub despawned_passives: Vec<PassiveId>,
    /// Mutations that applied this tick, in application order per cuboid.
    pub committed_mutations: BTreeMap<CuboidAddress, Vec<BlockMutation>>,
    /// Actions that applied this tick, in application order per entity.
    pub committed_actions: BTreeMap<EntityId, Vec<CommittedAction>>,
}

/// Immutable world view published at the end of a tick.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub state: WorldState,
    pub changes: TickChanges,
    pub events: Vec<EventRecord>,
    pub stats: TickStats,
}

impl WorldReader for WorldSnapshot {
    fn cuboid(&self, address: CuboidAddress) -> Option<&CuboidData> {
        self.state.cuboid(address)
    }
}

fn feed<T: Serialize>(hasher: &mut Sha256, value: &T) -> Result<(), SnapshotError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);
    Ok(())
}

impl WorldSnapshot {
    /// A world at tick zero holding `state`.
    pub fn initial(state: WorldState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Content hash of the persistent state: the tick, every record, and
    /// every queue. Statistics and ephemeral record fields are excluded, so
    /// equal simulations hash equal regardless of thread count.
    pub fn digest(&self) -> Result<[u8; 32], SnapshotError> {
        let mut hasher = Sha256::new();
        hasher.update(self.tick.to_le_bytes());
        for cuboid in self.state.cuboids.values() {
            let bytes = cuboid.to_bytes()?;
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        for entity in self.state.entities.values() {
            feed(&mut hasher, entity.as_ref())?;
        }
        for creature in self.state.creatures.values() {
            feed(&mut hasher, creature.as_ref())?;
        }
        for passive in self.state.passives.values() {
            feed(&mut hasher, passive.as_ref())?;
        }
        feed(&mut hasher, &self.state.pending_mutations)?;
        feed(&mut hasher, &self.state.pending_actions)?;
        feed(&mut hasher, &self.state.commit_levels)?;
        feed(
            &mut hasher,
            &(self.state.next_creature_id, self.state.next_passive_id),
        )?;
        feed(&mut hasher, &self.events)?;
        Ok(hasher.finalize().into())
    }

    pub fn digest_hex(&self) -> Result<String, SnapshotError> {
        Ok(self
            .digest()?
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect())
    }
}
