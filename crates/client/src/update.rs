use cubeworld_common::{CommitLevel, CuboidAddress, EntityId, PassiveId};
use cubeworld_cuboid::CuboidData;
use cubeworld_kernel::{
    BlockMutation, CommittedAction, Creature, CreatureEphemeral, Entity, EntityEphemeral,
    EventRecord, Passive, WorldSnapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Everything one client learns from one authoritative tick.
#[derive(Debug, Clone, Default)]
pub struct TickUpdate {
    pub tick: u64,
    /// Cuboids the client did not hold before, or that were reloaded.
    pub new_cuboids: Vec<Arc<CuboidData>>,
    pub unloaded_cuboids: Vec<CuboidAddress>,
    /// Entities that are new to the client or changed this tick.
    pub entities: Vec<Arc<Entity>>,
    pub unloaded_entities: Vec<EntityId>,
    /// Creatures that are new to the client or changed this tick.
    pub creatures: Vec<Arc<Creature>>,
    pub despawned_creatures: Vec<EntityId>,
    /// Passives that are new to the client or moved this tick.
    pub passives: Vec<Arc<Passive>>,
    pub despawned_passives: Vec<PassiveId>,
    /// Mutations applied this tick to cuboids the client already held.
    pub committed_mutations: Vec<BlockMutation>,
    pub committed_actions: BTreeMap<EntityId, Vec<CommittedAction>>,
    pub events: Vec<EventRecord>,
    /// Highest commit level of the client's own actions the server consumed.
    pub confirmed_commit_level: CommitLevel,
}

/// Which records a client has been sent.
#[derive(Debug, Clone, Default)]
pub struct KnownSet {
    pub cuboids: BTreeSet<CuboidAddress>,
    pub entities: BTreeSet<EntityId>,
    pub creatures: BTreeSet<EntityId>,
    pub passives: BTreeSet<PassiveId>,
}

/// Ids in `known` that `present` no longer has, removed from `known`.
fn forget_missing<K: Ord + Copy, V>(known: &mut BTreeSet<K>, present: &BTreeMap<K, V>) -> Vec<K> {
    let gone: Vec<K> = known
        .iter()
        .filter(|id| !present.contains_key(*id))
        .copied()
        .collect();
    for id in &gone {
        known.remove(id);
    }
    gone
}

/// Copy of an entity without server-only fields.
fn for_wire(entity: &Entity) -> Arc<Entity> {
    Arc::new(Entity {
        ephemeral: EntityEphemeral::default(),
        ..entity.clone()
    })
}

fn creature_for_wire(creature: &Creature) -> Arc<Creature> {
    Arc::new(Creature {
        ephemeral: CreatureEphemeral::default(),
        ..creature.clone()
    })
}

impl TickUpdate {
    /// Build the update for the client controlling `local`, and record what it
    /// now holds in `known`.
    pub fn for_client(snapshot: &WorldSnapshot, local: EntityId, known: &mut KnownSet) -> Self {
        let state = &snapshot.state;
        let changes = &snapshot.changes;

        let unloaded_cuboids: Vec<CuboidAddress> = known
            .cuboids
            .iter()
            .filter(|address| !state.cuboids.contains_key(*address))
            .copied()
            .collect();
        for address in &unloaded_cuboids {
            known.cuboids.remove(address);
        }
        let fresh = |address: &CuboidAddress| {
            !known.cuboids.contains(address) || changes.loaded_cuboids.contains(address)
        };
        let committed_mutations = changes
            .committed_mutations
            .iter()
            .filter(|(address, _)| !fresh(*address))
            .flat_map(|(_, list)| list.iter().cloned())
            .collect();
        let new_cuboids: Vec<Arc<CuboidData>> = state
            .cuboids
            .iter()
            .filter(|(address, _)| fresh(*address))
            .map(|(_, cuboid)| cuboid.clone())
            .collect();
        known.cuboids.extend(new_cuboids.iter().map(|cuboid| cuboid.address()));

        let unloaded_entities = forget_missing(&mut known.entities, &state.entities);
        let entities: Vec<Arc<Entity>> = state
            .entities
            .iter()
            .filter(|(id, _)| {
                !known.entities.contains(*id)
                    || changes.entity_updates.contains_key(*id)
                    || changes.loaded_entities.contains(*id)
            })
            .map(|(_, entity)| for_wire(entity))
            .collect();
        known.entities.extend(entities.iter().map(|entity| entity.id));

        let despawned_creatures = forget_missing(&mut known.creatures, &state.creatures);
        let creatures: Vec<Arc<Creature>> = state
            .creatures
            .iter()
            .filter(|(id, _)| !known.creatures.contains(*id) || changes.creature_updates.contains_key(*id))
            .map(|(_, creature)| creature_for_wire(creature))
            .collect();
        known.creatures.extend(creatures.iter().map(|creature| creature.id));

        let despawned_passives = forget_missing(&mut known.passives, &state.passives);
        let passives: Vec<Arc<Passive>> = state
            .passives
            .iter()
            .filter(|(id, _)| !known.passives.contains(*id) || changes.passive_updates.contains_key(*id))
            .map(|(_, passive)| passive.clone())
            .collect();
        known.passives.extend(passives.iter().map(|passive| passive.id));

        Self {
            tick: snapshot.tick,
            new_cuboids,
            unloaded_cuboids,
            entities,
            unloaded_entities,
            creatures,
            despawned_creatures,
            passives,
            despawned_passives,
            committed_mutations,
            committed_actions: changes.committed_actions.clone(),
            events: snapshot.events.clone(),
            confirmed_commit_level: state.commit_level(local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubeworld_common::{AbsoluteLocation, BlockType, ItemType, Vec3};
    use cubeworld_kernel::{CreatureKind, PassiveKind, RecordUpdate, WorldState};

    fn snapshot() -> WorldSnapshot {
        let mut state = WorldState::default();
        let address = CuboidAddress::new(0, 0, 0);
        state
            .cuboids
            .insert(address, Arc::new(CuboidData::filled(address, BlockType::AIR)));
        let mut entity = Entity::new(EntityId(1), Vec3::new(1.5, 1.5, 1.0));
        entity.ephemeral.last_action_tick = 9;
        state.entities.insert(EntityId(1), Arc::new(entity));
        state.commit_levels.insert(EntityId(1), CommitLevel(3));
        WorldSnapshot::initial(state)
    }

    #[test]
    fn first_update_sends_everything() {
        let mut known = KnownSet::default();
        let update = TickUpdate::for_client(&snapshot(), EntityId(1), &mut known);
        assert_eq!(update.new_cuboids.len(), 1);
        assert_eq!(update.entities.len(), 1);
        assert_eq!(update.entities[0].ephemeral, EntityEphemeral::default());
        assert_eq!(update.confirmed_commit_level, CommitLevel(3));
        assert_eq!(known.cuboids.len(), 1);
    }

    #[test]
    fn known_records_send_only_changes() {
        let mut known = KnownSet::default();
        let mut snapshot = snapshot();
        TickUpdate::for_client(&snapshot, EntityId(1), &mut known);

        let mutation = BlockMutation::SetBlock {
            location: AbsoluteLocation::new(1, 1, 1),
            block: BlockType::STONE,
        };
        snapshot.tick = 1;
        snapshot
            .changes
            .committed_mutations
            .insert(CuboidAddress::new(0, 0, 0), vec![mutation.clone()]);
        let update = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert!(update.new_cuboids.is_empty());
        assert!(update.entities.is_empty());
        assert_eq!(update.committed_mutations, vec![mutation]);
    }

    #[test]
    fn removals_are_reported_once() {
        let mut known = KnownSet::default();
        let mut snapshot = snapshot();
        TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        snapshot.state.cuboids.clear();
        snapshot.state.entities.clear();

        let update = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert_eq!(update.unloaded_cuboids, vec![CuboidAddress::new(0, 0, 0)]);
        assert_eq!(update.unloaded_entities, vec![EntityId(1)]);
        let again = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert!(again.unloaded_cuboids.is_empty());
        assert!(again.unloaded_entities.is_empty());
    }

    #[test]
    fn creatures_and_passives_follow_their_changes() {
        let mut known = KnownSet::default();
        let mut snapshot = snapshot();
        let mut cow = Creature::new(EntityId(-1), CreatureKind::Cow, Vec3::new(3.5, 3.5, 1.0));
        cow.ephemeral.wander_target = Some(AbsoluteLocation::new(4, 3, 1));
        snapshot.state.creatures.insert(cow.id, Arc::new(cow.clone()));
        let item = Passive {
            id: PassiveId(1),
            kind: PassiveKind::ItemStack {
                item: ItemType(1),
                count: 2,
            },
            location: Vec3::new(2.5, 2.5, 3.0),
            velocity: Vec3::ZERO,
            spawned_tick: 0,
        };
        snapshot.state.passives.insert(item.id, Arc::new(item.clone()));

        let first = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert_eq!(first.creatures.len(), 1);
        assert_eq!(first.creatures[0].ephemeral, CreatureEphemeral::default());
        assert_eq!(first.passives.len(), 1);

        // Unchanged records are not resent.
        snapshot.tick = 1;
        let quiet = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert!(quiet.creatures.is_empty() && quiet.passives.is_empty());

        let fallen = Arc::new(Passive {
            location: Vec3::new(2.5, 2.5, 1.0),
            ..item.clone()
        });
        snapshot.state.passives.insert(PassiveId(1), fallen.clone());
        snapshot.changes.passive_updates.insert(
            PassiveId(1),
            RecordUpdate {
                previous: Arc::new(item),
                current: fallen.clone(),
            },
        );
        snapshot.state.creatures.clear();
        let moved = TickUpdate::for_client(&snapshot, EntityId(1), &mut known);
        assert_eq!(moved.passives, vec![fallen]);
        assert_eq!(moved.despawned_creatures, vec![EntityId(-1)]);
        assert!(known.creatures.is_empty());
    }
}
