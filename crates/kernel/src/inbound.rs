use crate::action::EntityAction;
use crate::entity::Entity;
use crate::error::QueueError;
use crate::operator::OperatorCommand;
use cubeworld_common::{CommitLevel, CuboidAddress, EntityId};
use cubeworld_cuboid::CuboidData;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One inbound client action with its commit level.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundAction {
    pub action: EntityAction,
    pub commit_level: CommitLevel,
}

/// Everything drained from the inbound queues at the start of a tick.
#[derive(Debug, Default)]
pub struct InboundBatch {
    pub cuboid_loads: Vec<Arc<CuboidData>>,
    pub cuboid_unloads: Vec<CuboidAddress>,
    pub entity_loads: Vec<Entity>,
    pub entity_unloads: Vec<EntityId>,
    pub actions: BTreeMap<EntityId, Vec<InboundAction>>,
    pub operator_commands: Vec<OperatorCommand>,
}

#[derive(Default)]
struct Pending {
    batch: InboundBatch,
    /// Actions each entity already has queued in world state.
    carried: BTreeMap<EntityId, usize>,
}

/// Queues fed from outside the tick. Every method holds the lock only for a
/// push or a swap.
pub struct InboundQueues {
    pending: Mutex<Pending>,
    max_pending_per_entity: usize,
}

impl InboundQueues {
    pub fn new(max_pending_per_entity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            max_pending_per_entity,
        }
    }

    pub fn load_cuboids(&self, cuboids: impl IntoIterator<Item = CuboidData>) {
        let mut pending = self.pending.lock();
        pending
            .batch
            .cuboid_loads
            .extend(cuboids.into_iter().map(Arc::new));
    }

    pub fn unload_cuboids(&self, addresses: impl IntoIterator<Item = CuboidAddress>) {
        self.pending.lock().batch.cuboid_unloads.extend(addresses);
    }

    pub fn load_entities(&self, entities: impl IntoIterator<Item = Entity>) {
        self.pending.lock().batch.entity_loads.extend(entities);
    }

    pub fn unload_entities(&self, ids: impl IntoIterator<Item = EntityId>) {
        self.pending.lock().batch.entity_unloads.extend(ids);
    }

    /// Queue a client action for the next tick.
    ///
    /// Fails once the entity already has the configured number of actions
    /// waiting, counting both this inbox and its queue in world state; the
    /// caller should drop that client.
    pub fn enqueue_action(
        &self,
        entity: EntityId,
        action: EntityAction,
        commit_level: CommitLevel,
    ) -> Result<(), QueueError> {
        let mut pending = self.pending.lock();
        let carried = pending.carried.get(&entity).copied().unwrap_or(0);
        let queue = pending.batch.actions.entry(entity).or_default();
        if queue.len() + carried >= self.max_pending_per_entity {
            let pending = queue.len() + carried;
            tracing::warn!(?entity, pending, "inbound action queue flooded");
            return Err(QueueError::Flooded { entity, pending });
        }
        queue.push(InboundAction {
            action,
            commit_level,
        });
        Ok(())
    }

    pub fn enqueue_operator_command(&self, command: OperatorCommand) {
        self.pending.lock().batch.operator_commands.push(command);
    }

    /// Record how many actions each entity has queued in world state.
    /// Replaces the previous counts.
    pub fn set_carried(&self, counts: impl IntoIterator<Item = (EntityId, usize)>) {
        self.pending.lock().carried = counts.into_iter().filter(|(_, count)| *count > 0).collect();
    }

    /// Take everything queued so far. Carried counts stay until replaced.
    pub fn drain(&self) -> InboundBatch {
        std::mem::take(&mut self.pending.lock().batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flooding_is_refused() {
        let queues = InboundQueues::new(2);
        let heal = EntityAction::Heal { amount: 1 };
        queues
            .enqueue_action(EntityId(1), heal.clone(), CommitLevel(1))
            .unwrap();
        queues
            .enqueue_action(EntityId(1), heal.clone(), CommitLevel(2))
            .unwrap();
        assert_eq!(
            queues.enqueue_action(EntityId(1), heal.clone(), CommitLevel(3)),
            Err(QueueError::Flooded {
                entity: EntityId(1),
                pending: 2
            })
        );
        // Other entities have their own bound.
        queues
            .enqueue_action(EntityId(2), heal.clone(), CommitLevel(1))
            .unwrap();

        let batch = queues.drain();
        assert_eq!(batch.actions[&EntityId(1)].len(), 2);
        // Draining resets the bound.
        queues.enqueue_action(EntityId(1), heal, CommitLevel(3)).unwrap();
    }

    #[test]
    fn carried_actions_count_against_the_bound() {
        let queues = InboundQueues::new(3);
        let heal = EntityAction::Heal { amount: 1 };
        queues.set_carried([(EntityId(1), 2), (EntityId(2), 0)]);
        queues
            .enqueue_action(EntityId(1), heal.clone(), CommitLevel(1))
            .unwrap();
        assert_eq!(
            queues.enqueue_action(EntityId(1), heal.clone(), CommitLevel(2)),
            Err(QueueError::Flooded {
                entity: EntityId(1),
                pending: 3
            })
        );

        // Draining does not forget what is still carried.
        queues.drain();
        assert!(queues
            .enqueue_action(EntityId(1), heal.clone(), CommitLevel(2))
            .is_ok());
        assert!(queues
            .enqueue_action(EntityId(1), heal.clone(), CommitLevel(3))
            .is_err());

        queues.set_carried([]);
        queues.drain();
        for level in 3..6 {
            queues
                .enqueue_action(EntityId(1), heal.clone(), CommitLevel(level))
                .unwrap();
        }
    }

    #[test]
    fn drain_empties_everything() {
        let queues = InboundQueues::new(4);
        queues.unload_cuboids([CuboidAddress::new(0, 0, 0)]);
        queues.enqueue_operator_command(OperatorCommand::Heal {
            entity: EntityId(1),
            amount: 3,
        });
        let batch = queues.drain();
        assert_eq!(batch.cuboid_unloads.len(), 1);
        assert_eq!(batch.operator_commands.len(), 1);
        let again = queues.drain();
        assert!(again.cuboid_unloads.is_empty() && again.operator_commands.is_empty());
    }
}
