use crate::snapshot::WorldSnapshot;
use cubeworld_common::{CuboidAddress, EntityId};

/// Read-only queries against a published snapshot, for tooling and logs.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(snapshot: &WorldSnapshot) -> WorldSummary {
        let state = &snapshot.state;
        WorldSummary {
            tick: snapshot.tick,
            cuboids: state.cuboids.len(),
            entities: state.entities.len(),
            creatures: state.creatures.len(),
            passives: state.passives.len(),
            pending_mutations: state.pending_mutations.values().map(Vec::len).sum(),
            pending_actions: state.pending_actions.values().map(Vec::len).sum(),
            changed_cuboids: snapshot.changes.cuboid_updates.len(),
            events: snapshot.events.len(),
        }
    }

    pub fn inspect_entity(snapshot: &WorldSnapshot, id: EntityId) -> Option<EntityInfo> {
        snapshot.state.entities.get(&id).map(|entity| EntityInfo {
            id,
            location: entity.location.to_array(),
            health: entity.health,
            items: entity.inventory.total(),
            commit_level: snapshot.state.commit_level(id).0,
            pending_actions: snapshot
                .state
                .pending_actions
                .get(&id)
                .map_or(0, Vec::len),
        })
    }

    pub fn list_cuboids(snapshot: &WorldSnapshot) -> Vec<CuboidAddress> {
        snapshot.state.cuboids.keys().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub cuboids: usize,
    pub entities: usize,
    pub creatures: usize,
    pub passives: usize,
    pub pending_mutations: usize,
    pub pending_actions: usize,
    pub changed_cuboids: usize,
    pub events: usize,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tick={} cuboids={} entities={} creatures={} passives={} pending_mutations={} pending_actions={} changed={} events={}",
            self.tick,
            self.cuboids,
            self.entities,
            self.creatures,
            self.passives,
            self.pending_mutations,
            self.pending_actions,
            self.changed_cuboids,
            self.events
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub id: EntityId,
    pub location: [f32; 3],
    pub health: u8,
    pub items: u32,
    pub commit_level: u64,
    pub pending_actions: usize,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entity {} at ({:.2}, {:.2}, {:.2}) health={} items={} commit=c{} pending={}",
            self.id.0,
            self.location[0],
            self.location[1],
            self.location[2],
            self.health,
            self.items,
            self.commit_level,
            self.pending_actions
        )
    }
}
