use cubeworld_common::{AbsoluteLocation, BlockType, EntityId, ItemType};
use serde::{Deserialize, Serialize};

/// What happened, for listeners that present the world (sounds, particles, logs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    BlockPlaced(BlockType),
    BlockBroken(BlockType),
    ItemsStored { item: ItemType, count: u32 },
    CreatureSpawned(EntityId),
    CreatureDespawned(EntityId),
}

/// An event posted during a tick. Events are informational; nothing in the
/// simulation reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub location: AbsoluteLocation,
    pub source: Option<EntityId>,
}

impl EventRecord {
    pub fn new(kind: EventKind, location: AbsoluteLocation, source: Option<EntityId>) -> Self {
        Self {
            kind,
            location,
            source,
        }
    }
}
