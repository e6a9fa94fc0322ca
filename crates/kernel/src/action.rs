use crate::entity::{Entity, MAX_HEALTH};
use crate::mutation::BlockMutation;
use crate::physics::Physics;
use crate::reader::{Effects, WorldReader};
use cubeworld_common::{AbsoluteLocation, BlockType, ItemType, Vec3};
use serde::{Deserialize, Serialize};

/// Furthest block an entity can act on, measured from its eyes.
pub const REACH: f32 = 6.0;
/// Longest single move, in blocks.
pub const MAX_STEP: f32 = 2.0;
const EYE_HEIGHT: f32 = 1.5;

/// A change an entity requests for itself, queued against that entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityAction {
    Move {
        delta: Vec3,
    },
    /// Spend one item to place a block; the block lands next tick.
    PlaceBlock {
        target: AbsoluteLocation,
        block: BlockType,
    },
    /// One phase of breaking: marks the target as the ongoing activity and
    /// queues `millis` of damage for next tick.
    Break {
        target: AbsoluteLocation,
        millis: u16,
    },
    CancelActivity,
    /// Move items from the entity's inventory into an air block.
    StoreItems {
        target: AbsoluteLocation,
        item: ItemType,
        count: u32,
    },
    Heal {
        amount: u8,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    #[error("step of {0} blocks is longer than {MAX_STEP}")]
    TooFar(f32),
    #[error("step {0} is not finite")]
    NotFinite(Vec3),
    #[error("movement blocked")]
    Blocked,
    #[error("{0:?} is out of reach")]
    OutOfReach(AbsoluteLocation),
    #[error("{0:?} is not loaded")]
    NotLoaded(AbsoluteLocation),
    #[error("{0:?} is occupied")]
    Occupied(AbsoluteLocation),
    #[error("nothing to break at {0:?}")]
    NothingToBreak(AbsoluteLocation),
    #[error("already breaking {0:?}")]
    ActivityInProgress(AbsoluteLocation),
    #[error("no activity to cancel")]
    NoActivity,
    #[error("missing {count} of {item:?}")]
    MissingItems { item: ItemType, count: u32 },
    #[error("{0:?} cannot be placed")]
    NotPlaceable(BlockType),
}

/// What an action may consult besides the entity it applies to.
pub struct ActionContext<'a> {
    pub world: &'a dyn WorldReader,
    pub physics: &'a dyn Physics,
}

fn check_reach(entity: &Entity, target: AbsoluteLocation) -> Result<(), ActionError> {
    let eyes = entity.location + Vec3::new(0.0, 0.0, EYE_HEIGHT);
    if target.distance_squared_to(eyes) > REACH * REACH {
        return Err(ActionError::OutOfReach(target));
    }
    Ok(())
}

fn loaded_block(ctx: &ActionContext<'_>, target: AbsoluteLocation) -> Result<BlockType, ActionError> {
    ctx.world
        .block_type_at(target)
        .ok_or(ActionError::NotLoaded(target))
}

impl EntityAction {
    /// Apply to `entity`.
    ///
    /// On error the caller discards `entity` and `effects`; implementations
    /// may leave either half-written.
    pub fn apply(
        &self,
        entity: &mut Entity,
        ctx: &ActionContext<'_>,
        effects: &mut Effects,
    ) -> Result<(), ActionError> {
        match *self {
            EntityAction::Move { delta } => {
                if !delta.is_finite() {
                    return Err(ActionError::NotFinite(delta));
                }
                let length = delta.length();
                if length > MAX_STEP {
                    return Err(ActionError::TooFar(length));
                }
                if delta == Vec3::ZERO {
                    return Ok(());
                }
                entity.location = ctx
                    .physics
                    .resolve_move(ctx.world, entity.location, delta)
                    .ok_or(ActionError::Blocked)?;
                Ok(())
            }
            EntityAction::PlaceBlock { target, block } => {
                let item = block.as_item().ok_or(ActionError::NotPlaceable(block))?;
                check_reach(entity, target)?;
                if loaded_block(ctx, target)?.is_solid() || entity.occupies(target) {
                    return Err(ActionError::Occupied(target));
                }
                if !entity.inventory.remove(item, 1) {
                    return Err(ActionError::MissingItems { item, count: 1 });
                }
                effects.schedule(
                    BlockMutation::ReplaceBlock {
                        location: target,
                        expected: BlockType::AIR,
                        replacement: block,
                    },
                    0,
                );
                Ok(())
            }
            EntityAction::Break { target, millis } => {
                check_reach(entity, target)?;
                if loaded_block(ctx, target)?.is_air() {
                    return Err(ActionError::NothingToBreak(target));
                }
                match entity.ongoing_break {
                    Some(current) if current != target => {
                        return Err(ActionError::ActivityInProgress(current));
                    }
                    _ => entity.ongoing_break = Some(target),
                }
                effects.schedule(
                    BlockMutation::IncrementalBreak {
                        location: target,
                        damage: millis,
                        source: Some(entity.id),
                    },
                    0,
                );
                Ok(())
            }
            EntityAction::CancelActivity => {
                entity.ongoing_break.take().ok_or(ActionError::NoActivity)?;
                Ok(())
            }
            EntityAction::StoreItems {
                target,
                item,
                count,
            } => {
                check_reach(entity, target)?;
                if loaded_block(ctx, target)?.is_solid() {
                    return Err(ActionError::Occupied(target));
                }
                if !entity.inventory.remove(item, count) {
                    return Err(ActionError::MissingItems { item, count });
                }
                effects.schedule(
                    BlockMutation::StoreItems {
                        location: target,
                        item,
                        count,
                    },
                    0,
                );
                Ok(())
            }
            EntityAction::Heal { amount } => {
                entity.health = entity.health.saturating_add(amount).min(MAX_HEALTH);
                Ok(())
            }
        }
    }

    /// The block this action aims at, for actions that have one.
    pub fn target(&self) -> Option<AbsoluteLocation> {
        match self {
            EntityAction::PlaceBlock { target, .. }
            | EntityAction::Break { target, .. }
            | EntityAction::StoreItems { target, .. } => Some(*target),
            EntityAction::Move { .. } | EntityAction::CancelActivity | EntityAction::Heal { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::SimplePhysics;
    use cubeworld_common::{CuboidAddress, EntityId};
    use cubeworld_cuboid::{BlockTypeAspect, CuboidData};

    struct Floor(CuboidData);

    impl WorldReader for Floor {
        fn cuboid(&self, address: CuboidAddress) -> Option<&CuboidData> {
            (address == self.0.address()).then_some(&self.0)
        }
    }

    fn floor() -> Floor {
        let mut cuboid = CuboidData::filled(CuboidAddress::new(0, 0, 0), BlockType::AIR);
        for x in 0..32 {
            for y in 0..32 {
                cuboid.set::<BlockTypeAspect>(
                    AbsoluteLocation::new(x, y, 0).block(),
                    BlockType::STONE,
                );
            }
        }
        Floor(cuboid)
    }

    fn player() -> Entity {
        Entity::new(EntityId(1), Vec3::new(4.5, 4.5, 1.0)).with_items(ItemType(1), 2)
    }

    fn run(action: EntityAction, entity: &mut Entity) -> (Result<(), ActionError>, Effects) {
        let world = floor();
        let physics = SimplePhysics::default();
        let ctx = ActionContext {
            world: &world,
            physics: &physics,
        };
        let mut effects = Effects::default();
        let result = action.apply(entity, &ctx, &mut effects);
        (result, effects)
    }

    #[test]
    fn place_spends_item_and_schedules_block() {
        let mut entity = player();
        let target = AbsoluteLocation::new(6, 4, 1);
        let (result, effects) = run(
            EntityAction::PlaceBlock {
                target,
                block: BlockType::STONE,
            },
            &mut entity,
        );
        result.unwrap();
        assert_eq!(entity.inventory.count(ItemType(1)), 1);
        assert_eq!(
            effects.mutations[0].mutation,
            BlockMutation::ReplaceBlock {
                location: target,
                expected: BlockType::AIR,
                replacement: BlockType::STONE,
            }
        );
    }

    #[test]
    fn place_fails_on_solid_body_or_missing_item() {
        let mut entity = player();
        let solid = EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(4, 4, 0),
            block: BlockType::STONE,
        };
        assert!(matches!(run(solid, &mut entity).0, Err(ActionError::Occupied(_))));
        let inside = EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(4, 4, 2),
            block: BlockType::STONE,
        };
        assert!(matches!(run(inside, &mut entity).0, Err(ActionError::Occupied(_))));
        let dirt = EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(6, 4, 1),
            block: BlockType::DIRT,
        };
        assert!(matches!(
            run(dirt, &mut entity).0,
            Err(ActionError::MissingItems { .. })
        ));
    }

    #[test]
    fn out_of_reach_and_unloaded_targets_fail() {
        let mut entity = player();
        let far = EntityAction::Break {
            target: AbsoluteLocation::new(20, 20, 0),
            millis: 50,
        };
        assert!(matches!(run(far, &mut entity).0, Err(ActionError::OutOfReach(_))));
        let unloaded = EntityAction::Break {
            target: AbsoluteLocation::new(4, 4, -1),
            millis: 50,
        };
        assert!(matches!(run(unloaded, &mut entity).0, Err(ActionError::NotLoaded(_))));
    }

    #[test]
    fn break_tracks_one_activity_until_cancelled() {
        let mut entity = player();
        let first = AbsoluteLocation::new(4, 4, 0);
        let second = AbsoluteLocation::new(5, 4, 0);
        let (result, effects) = run(
            EntityAction::Break {
                target: first,
                millis: 100,
            },
            &mut entity,
        );
        result.unwrap();
        assert_eq!(entity.ongoing_break, Some(first));
        assert_eq!(effects.mutations.len(), 1);

        let (result, _) = run(
            EntityAction::Break {
                target: second,
                millis: 100,
            },
            &mut entity,
        );
        assert_eq!(result, Err(ActionError::ActivityInProgress(first)));

        run(EntityAction::CancelActivity, &mut entity).0.unwrap();
        assert_eq!(entity.ongoing_break, None);
        assert_eq!(
            run(EntityAction::CancelActivity, &mut entity).0,
            Err(ActionError::NoActivity)
        );
        run(
            EntityAction::Break {
                target: second,
                millis: 100,
            },
            &mut entity,
        )
        .0
        .unwrap();
        assert_eq!(entity.ongoing_break, Some(second));
    }

    #[test]
    fn move_checks_length_and_collision() {
        let mut entity = player();
        run(
            EntityAction::Move {
                delta: Vec3::new(1.0, 0.0, 0.0),
            },
            &mut entity,
        )
        .0
        .unwrap();
        assert_eq!(entity.location, Vec3::new(5.5, 4.5, 1.0));
        assert!(matches!(
            run(
                EntityAction::Move {
                    delta: Vec3::new(3.0, 0.0, 0.0)
                },
                &mut entity
            )
            .0,
            Err(ActionError::TooFar(_))
        ));
        assert_eq!(
            run(
                EntityAction::Move {
                    delta: Vec3::new(0.0, 0.0, -1.0)
                },
                &mut entity
            )
            .0,
            Err(ActionError::Blocked)
        );
    }

    #[test]
    fn non_finite_move_is_refused() {
        for delta in [
            Vec3::new(f32::NAN, 0.0, 0.0),
            Vec3::new(0.0, f32::INFINITY, 0.0),
            Vec3::new(0.0, 0.0, f32::NEG_INFINITY),
        ] {
            let mut entity = player();
            let (result, effects) = run(EntityAction::Move { delta }, &mut entity);
            assert!(matches!(result, Err(ActionError::NotFinite(_))));
            assert!(effects.mutations.is_empty());
            assert_eq!(entity.location, Vec3::new(4.5, 4.5, 1.0));
        }
    }

    #[test]
    fn heal_caps_at_max() {
        let mut entity = player();
        entity.health = 90;
        run(EntityAction::Heal { amount: 50 }, &mut entity).0.unwrap();
        assert_eq!(entity.health, MAX_HEALTH);
    }
}
