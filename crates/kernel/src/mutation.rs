use crate::entity::{PassiveKind, PassiveSpawn};
use crate::event::{EventKind, EventRecord};
use crate::reader::{Effects, WorldReader};
use cubeworld_common::{AbsoluteLocation, BlockType, EntityId, ItemType, Vec3};
use cubeworld_cuboid::{
    BlockTypeAspect, DamageAspect, Inventory, InventoryAspect, LightAspect, LogicAspect,
    MutableCuboid,
};
use serde::{Deserialize, Serialize};

pub const MAX_LIGHT: u8 = 15;
pub const BLOCK_INVENTORY_CAPACITY: u32 = 128;

/// Milliseconds of breaking a block of this type survives.
pub fn toughness(block: BlockType) -> u16 {
    match block {
        BlockType::STONE => 1500,
        BlockType::PLANK => 1000,
        _ => 500,
    }
}

/// A change to one block, queued against the cuboid containing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockMutation {
    /// Replace `expected` with `replacement`; fails if the block is anything else.
    ReplaceBlock {
        location: AbsoluteLocation,
        expected: BlockType,
        replacement: BlockType,
    },
    /// Unconditional overwrite, used by operators.
    SetBlock {
        location: AbsoluteLocation,
        block: BlockType,
    },
    /// Add break damage; the block turns to air once damage reaches its toughness.
    IncrementalBreak {
        location: AbsoluteLocation,
        damage: u16,
        source: Option<EntityId>,
    },
    /// Put items into the inventory of an air block.
    StoreItems {
        location: AbsoluteLocation,
        item: ItemType,
        count: u32,
    },
    /// A sand block lost its support and starts falling.
    Detach { location: AbsoluteLocation },
    SetLight {
        location: AbsoluteLocation,
        level: u8,
    },
    SetLogic {
        location: AbsoluteLocation,
        value: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("expected {expected:?} at {location:?}, found {found:?}")]
    UnexpectedBlock {
        location: AbsoluteLocation,
        expected: BlockType,
        found: BlockType,
    },
    #[error("nothing to break at {0:?}")]
    NotBreakable(AbsoluteLocation),
    #[error("block at {0:?} cannot hold items")]
    NotStorage(AbsoluteLocation),
    #[error("inventory at {0:?} is full")]
    InventoryFull(AbsoluteLocation),
    #[error("light level {0} is above {MAX_LIGHT}")]
    LightOutOfRange(u8),
}

impl BlockMutation {
    /// The block this mutation targets; it is queued on that block's cuboid.
    pub fn location(&self) -> AbsoluteLocation {
        match self {
            BlockMutation::ReplaceBlock { location, .. }
            | BlockMutation::SetBlock { location, .. }
            | BlockMutation::IncrementalBreak { location, .. }
            | BlockMutation::StoreItems { location, .. }
            | BlockMutation::Detach { location }
            | BlockMutation::SetLight { location, .. }
            | BlockMutation::SetLogic { location, .. } => *location,
        }
    }

    /// Apply against the cuboid's tick session.
    ///
    /// Every precondition is checked before the first write, so an error
    /// leaves `session` untouched. `world` serves reads outside the session's
    /// cuboid; `effects` collects follow-up work for later ticks.
    pub fn apply(
        &self,
        session: &mut MutableCuboid,
        world: &dyn WorldReader,
        effects: &mut Effects,
    ) -> Result<(), MutationError> {
        let location = self.location();
        debug_assert_eq!(location.cuboid(), session.address());
        let block = location.block();
        let current = session.read::<BlockTypeAspect>(block);
        match *self {
            BlockMutation::ReplaceBlock {
                expected,
                replacement,
                ..
            } => {
                if current != expected {
                    return Err(MutationError::UnexpectedBlock {
                        location,
                        expected,
                        found: current,
                    });
                }
                replace(session, world, effects, location, replacement);
                if expected.is_air() && replacement.is_solid() {
                    effects.events.push(EventRecord::new(
                        EventKind::BlockPlaced(replacement),
                        location,
                        None,
                    ));
                }
                Ok(())
            }
            BlockMutation::SetBlock { block, .. } => {
                replace(session, world, effects, location, block);
                Ok(())
            }
            BlockMutation::IncrementalBreak { damage, source, .. } => {
                if !current.is_solid() {
                    return Err(MutationError::NotBreakable(location));
                }
                let total = session.read::<DamageAspect>(block).saturating_add(damage);
                if total >= toughness(current) {
                    replace(session, world, effects, location, BlockType::AIR);
                    if let Some(item) = current.as_item() {
                        effects.passives.push(PassiveSpawn {
                            kind: PassiveKind::ItemStack { item, count: 1 },
                            location: location.floor_center(),
                            velocity: Vec3::ZERO,
                        });
                    }
                    effects.events.push(EventRecord::new(
                        EventKind::BlockBroken(current),
                        location,
                        source,
                    ));
                } else {
                    session.proxy(location).set::<DamageAspect>(total);
                }
                Ok(())
            }
            BlockMutation::StoreItems { item, count, .. } => {
                if current.is_solid() {
                    return Err(MutationError::NotStorage(location));
                }
                let mut inventory = session
                    .read::<InventoryAspect>(block)
                    .unwrap_or_else(|| Inventory::with_capacity(BLOCK_INVENTORY_CAPACITY));
                let accepted = inventory.add(item, count);
                if accepted == 0 {
                    return Err(MutationError::InventoryFull(location));
                }
                session
                    .proxy(location)
                    .set::<InventoryAspect>(Some(inventory));
                effects.events.push(EventRecord::new(
                    EventKind::ItemsStored {
                        item,
                        count: accepted,
                    },
                    location,
                    None,
                ));
                Ok(())
            }
            BlockMutation::Detach { .. } => {
                if current != BlockType::SAND {
                    return Err(MutationError::UnexpectedBlock {
                        location,
                        expected: BlockType::SAND,
                        found: current,
                    });
                }
                replace(session, world, effects, location, BlockType::AIR);
                effects.passives.push(PassiveSpawn {
                    kind: PassiveKind::FallingBlock {
                        block: BlockType::SAND,
                    },
                    location: location.floor_center(),
                    velocity: Vec3::ZERO,
                });
                Ok(())
            }
            BlockMutation::SetLight { level, .. } => {
                if level > MAX_LIGHT {
                    return Err(MutationError::LightOutOfRange(level));
                }
                session.proxy(location).set::<LightAspect>(level);
                Ok(())
            }
            BlockMutation::SetLogic { value, .. } => {
                session.proxy(location).set::<LogicAspect>(value);
                Ok(())
            }
        }
    }
}

/// Overwrite the block type, clearing damage. Items stored in the space spill
/// out when a solid block takes it; sand resting on top detaches when it
/// becomes air.
fn replace(
    session: &mut MutableCuboid,
    world: &dyn WorldReader,
    effects: &mut Effects,
    location: AbsoluteLocation,
    replacement: BlockType,
) {
    let block = location.block();
    if replacement.is_solid() {
        if let Some(inventory) = session.read::<InventoryAspect>(block) {
            for (item, count) in inventory.items() {
                effects.passives.push(PassiveSpawn {
                    kind: PassiveKind::ItemStack {
                        item: *item,
                        count: *count,
                    },
                    location: location.relative(0, 0, 1).floor_center(),
                    velocity: Vec3::ZERO,
                });
            }
        }
    }
    let proxy = session.proxy(location);
    proxy.set_block_type(replacement);
    proxy.set::<DamageAspect>(0);
    if replacement.is_solid() {
        proxy.set::<InventoryAspect>(None);
    }

    if replacement.is_air() {
        let above = location.relative(0, 0, 1);
        let above_block = if above.cuboid() == session.address() {
            Some(session.read::<BlockTypeAspect>(above.block()))
        } else {
            world.block_type_at(above)
        };
        if above_block == Some(BlockType::SAND) {
            effects.schedule(BlockMutation::Detach { location: above }, 0);
        }
    }
}
