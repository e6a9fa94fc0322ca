use cubeworld_common::{AbsoluteLocation, BlockType, EntityId, ItemType, PassiveId, Vec3};
use cubeworld_cuboid::Inventory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_HEALTH: u8 = 100;
pub const MAX_BREATH: u8 = 100;
pub const ENTITY_INVENTORY_CAPACITY: u32 = 64;

/// A player-controlled entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub location: Vec3,
    pub velocity: Vec3,
    pub health: u8,
    pub breath: u8,
    pub inventory: Inventory,
    /// Block the entity has started breaking. Only `CancelActivity` clears it.
    pub ongoing_break: Option<AbsoluteLocation>,
    /// Server-only bookkeeping, never sent or persisted.
    #[serde(skip)]
    pub ephemeral: EntityEphemeral,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityEphemeral {
    /// Tick in which the last action for this entity applied.
    pub last_action_tick: u64,
}

impl Entity {
    pub fn new(id: EntityId, location: Vec3) -> Self {
        Self {
            id,
            location,
            velocity: Vec3::ZERO,
            health: MAX_HEALTH,
            breath: MAX_BREATH,
            inventory: Inventory::with_capacity(ENTITY_INVENTORY_CAPACITY),
            ongoing_break: None,
            ephemeral: EntityEphemeral::default(),
        }
    }

    pub fn with_items(mut self, item: ItemType, count: u32) -> Self {
        self.inventory.add(item, count);
        self
    }

    pub fn block_location(&self) -> AbsoluteLocation {
        AbsoluteLocation::containing(self.location)
    }

    /// Whether a block at `location` would overlap this entity's body.
    /// Bodies are two blocks tall.
    pub fn occupies(&self, location: AbsoluteLocation) -> bool {
        let feet = self.block_location();
        location == feet || location == feet.relative(0, 0, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatureKind {
    Cow,
    Orc,
}

impl CreatureKind {
    pub fn max_health(self) -> u8 {
        match self {
            CreatureKind::Cow => 40,
            CreatureKind::Orc => 60,
        }
    }

    /// Walking speed in blocks per second.
    pub fn speed(self) -> f32 {
        match self {
            CreatureKind::Cow => 1.0,
            CreatureKind::Orc => 1.5,
        }
    }
}

/// An AI-controlled entity. Ids are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: EntityId,
    pub kind: CreatureKind,
    pub location: Vec3,
    pub velocity: Vec3,
    pub health: u8,
    #[serde(skip)]
    pub ephemeral: CreatureEphemeral,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatureEphemeral {
    /// Last block the brain chose to walk towards.
    pub wander_target: Option<AbsoluteLocation>,
}

impl Creature {
    pub fn new(id: EntityId, kind: CreatureKind, location: Vec3) -> Self {
        Self {
            id,
            kind,
            location,
            velocity: Vec3::ZERO,
            health: kind.max_health(),
            ephemeral: CreatureEphemeral::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassiveKind {
    ItemStack { item: ItemType, count: u32 },
    FallingBlock { block: BlockType },
}

/// A non-thinking object moved only by physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passive {
    pub id: PassiveId,
    pub kind: PassiveKind,
    pub location: Vec3,
    pub velocity: Vec3,
    pub spawned_tick: u64,
}

/// Request to create a passive; the id is assigned when the tick merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveSpawn {
    pub kind: PassiveKind,
    pub location: Vec3,
    pub velocity: Vec3,
}

/// Request to create a creature; the id is assigned when the tick merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSpawn {
    pub kind: CreatureKind,
    pub location: Vec3,
}

/// Superseded and current versions of one record that changed in a tick.
#[derive(Debug, Clone)]
pub struct RecordUpdate<T> {
    pub previous: Arc<T>,
    pub current: Arc<T>,
}
