use crate::error::ProjectionError;
use cubeworld_common::{CuboidAddress, EntityId, PassiveId};
use cubeworld_cuboid::{CuboidData, MutableCuboid};
use cubeworld_kernel::{
    ActionContext, BlockMutation, Creature, Effects, Entity, EntityAction, Passive, Physics,
    WorldReader,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The slice of the world one client holds: the records it has been sent.
/// Only cuboids and entities are ever projected; creatures and passives
/// always show the last confirmed state.
#[derive(Debug, Clone, Default)]
pub struct ClientWorld {
    pub cuboids: BTreeMap<CuboidAddress, Arc<CuboidData>>,
    pub entities: BTreeMap<EntityId, Arc<Entity>>,
    pub creatures: BTreeMap<EntityId, Arc<Creature>>,
    pub passives: BTreeMap<PassiveId, Arc<Passive>>,
}

impl WorldReader for ClientWorld {
    fn cuboid(&self, address: CuboidAddress) -> Option<&CuboidData> {
        self.cuboids.get(&address).map(|cuboid| cuboid.as_ref())
    }
}

impl ClientWorld {
    /// Apply one block mutation in place.
    pub fn apply_mutation(&mut self, mutation: &BlockMutation) -> Result<Effects, ProjectionError> {
        let address = mutation.location().cuboid();
        let cuboid = self
            .cuboids
            .get(&address)
            .ok_or(ProjectionError::CuboidNotLoaded(address))?;
        let mut session = MutableCuboid::new(cuboid.clone());
        let mut effects = Effects::default();
        mutation.apply(&mut session, &*self, &mut effects)?;
        if let Some(update) = session.commit() {
            self.cuboids.insert(address, update.current);
        }
        Ok(effects)
    }

    /// Apply an action to one entity, returning the mutations it queued for
    /// the following tick. The world's cuboids are untouched.
    pub fn apply_action(
        &mut self,
        entity: EntityId,
        action: &EntityAction,
        physics: &dyn Physics,
    ) -> Result<Vec<BlockMutation>, ProjectionError> {
        let current = self
            .entities
            .get(&entity)
            .ok_or(ProjectionError::EntityNotLoaded(entity))?;
        let mut next = Entity::clone(current);
        let mut effects = Effects::default();
        let ctx = ActionContext {
            world: &*self,
            physics,
        };
        action.apply(&mut next, &ctx, &mut effects)?;
        if next != **current {
            self.entities.insert(entity, Arc::new(next));
        }
        Ok(effects
            .mutations
            .into_iter()
            .filter(|scheduled| scheduled.delay_millis == 0)
            .map(|scheduled| scheduled.mutation)
            .collect())
    }

    /// Apply an action and then, immediately, the follow-up mutations the
    /// server will only apply next tick. Follow-ups that fail are skipped.
    pub fn speculate(
        &mut self,
        entity: EntityId,
        action: &EntityAction,
        physics: &dyn Physics,
    ) -> Result<Vec<BlockMutation>, ProjectionError> {
        let follow_ups = self.apply_action(entity, action, physics)?;
        self.apply_follow_ups(&follow_ups);
        Ok(follow_ups)
    }

    pub fn apply_follow_ups(&mut self, mutations: &[BlockMutation]) {
        for mutation in mutations {
            if let Err(error) = self.apply_mutation(mutation) {
                tracing::debug!(?mutation, %error, "follow-up not projected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubeworld_common::{AbsoluteLocation, BlockType, ItemType, Vec3};
    use cubeworld_kernel::SimplePhysics;

    fn world() -> ClientWorld {
        let address = CuboidAddress::new(0, 0, 0);
        let mut world = ClientWorld::default();
        world
            .cuboids
            .insert(address, Arc::new(CuboidData::filled(address, BlockType::AIR)));
        world.entities.insert(
            EntityId(1),
            Arc::new(Entity::new(EntityId(1), Vec3::new(4.5, 4.5, 4.0)).with_items(ItemType(1), 1)),
        );
        world
    }

    #[test]
    fn speculate_applies_both_phases() {
        let mut world = world();
        let target = AbsoluteLocation::new(6, 4, 4);
        let action = EntityAction::PlaceBlock {
            target,
            block: BlockType::STONE,
        };
        let follow_ups = world
            .speculate(EntityId(1), &action, &SimplePhysics::default())
            .unwrap();
        assert_eq!(follow_ups.len(), 1);
        assert_eq!(world.block_type_at(target), Some(BlockType::STONE));
        assert_eq!(world.entities[&EntityId(1)].inventory.count(ItemType(1)), 0);
    }

    #[test]
    fn failed_action_leaves_world_alone() {
        let mut world = world();
        let before = world.entities[&EntityId(1)].clone();
        let action = EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(6, 4, 4),
            block: BlockType::DIRT,
        };
        assert!(matches!(
            world.speculate(EntityId(1), &action, &SimplePhysics::default()),
            Err(ProjectionError::Action(_))
        ));
        assert!(Arc::ptr_eq(&before, &world.entities[&EntityId(1)]));
    }

    #[test]
    fn mutation_on_missing_cuboid_is_reported() {
        let mut world = world();
        let mutation = BlockMutation::SetBlock {
            location: AbsoluteLocation::new(-1, 0, 0),
            block: BlockType::DIRT,
        };
        assert_eq!(
            world.apply_mutation(&mutation).err(),
            Some(ProjectionError::CuboidNotLoaded(CuboidAddress::new(-1, 0, 0)))
        );
    }
}
