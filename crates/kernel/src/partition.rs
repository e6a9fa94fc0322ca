use crate::snapshot::WorldState;
use cubeworld_common::{AbsoluteLocation, ColumnAddress, CuboidAddress, EntityId, PassiveId, Vec3};
use std::collections::BTreeMap;

/// Everything one column owns for a tick: its cuboids and the entities,
/// creatures, and passives standing in it.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWork {
    pub column: ColumnAddress,
    pub cuboids: Vec<CuboidAddress>,
    pub entities: Vec<EntityId>,
    pub creatures: Vec<EntityId>,
    pub passives: Vec<PassiveId>,
}

impl ColumnWork {
    fn new(column: ColumnAddress) -> Self {
        Self {
            column,
            cuboids: Vec::new(),
            entities: Vec::new(),
            creatures: Vec::new(),
            passives: Vec::new(),
        }
    }
}

/// A claimable piece of one tick's parallel phase. A unit's index in the
/// partition is its merge key.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkUnit {
    Column(ColumnWork),
    SpawnCreature,
    OperatorCommands,
}

pub fn column_of(location: Vec3) -> ColumnAddress {
    AbsoluteLocation::containing(location).cuboid().column()
}

fn column(
    columns: &mut BTreeMap<ColumnAddress, ColumnWork>,
    address: ColumnAddress,
) -> &mut ColumnWork {
    columns
        .entry(address)
        .or_insert_with(|| ColumnWork::new(address))
}

/// Split the world into units: one per occupied column in address order,
/// then the single-shot units.
pub fn partition(state: &WorldState) -> Vec<WorkUnit> {
    let mut columns: BTreeMap<ColumnAddress, ColumnWork> = BTreeMap::new();
    for address in state.cuboids.keys() {
        column(&mut columns, address.column()).cuboids.push(*address);
    }
    for (id, entity) in &state.entities {
        column(&mut columns, column_of(entity.location)).entities.push(*id);
    }
    for (id, creature) in &state.creatures {
        column(&mut columns, column_of(creature.location)).creatures.push(*id);
    }
    for (id, passive) in &state.passives {
        column(&mut columns, column_of(passive.location)).passives.push(*id);
    }

    let mut units: Vec<WorkUnit> = columns.into_values().map(WorkUnit::Column).collect();
    units.push(WorkUnit::SpawnCreature);
    units.push(WorkUnit::OperatorCommands);
    tracing::trace!(units = units.len(), "world partitioned");
    units
}
