use crate::entity::{Creature, Passive, RecordUpdate};
use crate::event::{EventKind, EventRecord};
use crate::inbound::InboundBatch;
use crate::operator::OperatorCommand;
use crate::partition::{WorkUnit, partition};
use crate::scheduled::ScheduledAction;
use crate::snapshot::{TickChanges, WorldSnapshot, WorldState};
use crate::timing::TickStats;
use crate::unit::UnitOutput;
use cubeworld_common::{AbsoluteLocation, EntityId, PassiveId};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

/// One tick's inputs, fixed by the preamble and read by every worker.
pub(crate) struct TickPlan {
    pub tick: u64,
    pub state: WorldState,
    /// Load and unload lists; the merge fills in the rest.
    pub lifecycle: TickChanges,
    pub operator_commands: Vec<OperatorCommand>,
    pub units: Vec<WorkUnit>,
    pub next_unit: AtomicUsize,
}

/// Apply inbound loads, unloads, and actions to the previous state and
/// partition the result.
pub(crate) fn prepare(previous: &WorldSnapshot, batch: InboundBatch) -> TickPlan {
    let mut state = previous.state.clone();
    let mut lifecycle = TickChanges::default();

    for address in batch.cuboid_unloads {
        if state.cuboids.remove(&address).is_some() {
            state.pending_mutations.remove(&address);
            lifecycle.unloaded_cuboids.push(address);
        }
    }
    for cuboid in batch.cuboid_loads {
        let address = cuboid.address();
        if state.cuboids.insert(address, cuboid).is_some() {
            tracing::debug!(?address, "cuboid reloaded");
        }
        lifecycle.loaded_cuboids.push(address);
    }
    for id in batch.entity_unloads {
        if state.entities.remove(&id).is_some() {
            state.pending_actions.remove(&id);
            state.commit_levels.remove(&id);
            lifecycle.unloaded_entities.push(id);
        }
    }
    for entity in batch.entity_loads {
        let id = entity.id;
        state.entities.insert(id, Arc::new(entity));
        lifecycle.loaded_entities.push(id);
    }
    for (id, actions) in batch.actions {
        if !state.entities.contains_key(&id) {
            tracing::debug!(entity = ?id, dropped = actions.len(), "actions for unknown entity");
            continue;
        }
        state
            .pending_actions
            .entry(id)
            .or_default()
            .extend(actions.into_iter().map(|inbound| ScheduledAction {
                action: inbound.action,
                commit_level: inbound.commit_level,
                delay_millis: 0,
            }));
    }

    let units = partition(&state);
    TickPlan {
        tick: previous.tick + 1,
        state,
        lifecycle,
        operator_commands: batch.operator_commands,
        units,
        next_unit: AtomicUsize::new(0),
    }
}

/// Fold unit outputs, sorted by unit index, into the next snapshot.
///
/// Queues are rebuilt from what each unit carried, then follow-ups are
/// appended behind them; follow-ups aimed at unloaded cuboids or unknown
/// entities are dropped.
pub(crate) fn merge(plan: &TickPlan, outputs: Vec<UnitOutput>, mut stats: TickStats) -> WorldSnapshot {
    let tick = plan.tick;
    let mut state = plan.state.clone();
    let mut changes = plan.lifecycle.clone();
    state.pending_mutations.clear();
    state.pending_actions.clear();

    let mut events = Vec::new();
    let mut follow_up_mutations = Vec::new();
    let mut passive_spawns = Vec::new();
    let mut creature_spawns = Vec::new();
    let mut scheduled_actions = Vec::new();

    for out in outputs {
        stats.mutations_applied += out.mutations_applied;
        stats.mutations_failed += out.mutations_failed;
        stats.actions_applied += out.actions_applied;
        stats.actions_failed += out.actions_failed;

        for update in out.cuboid_updates {
            let address = update.current.address();
            state.cuboids.insert(address, update.current.clone());
            changes.cuboid_updates.insert(address, update);
        }
        state.pending_mutations.extend(out.carried_mutations);
        changes.committed_mutations.extend(out.committed_mutations);

        for current in out.entity_updates {
            if let Some(previous) = state.entities.insert(current.id, current.clone()) {
                changes
                    .entity_updates
                    .insert(current.id, RecordUpdate { previous, current });
            }
        }
        state.pending_actions.extend(out.carried_actions);
        changes.committed_actions.extend(out.committed_actions);
        state.commit_levels.extend(out.commit_levels);

        for current in out.creature_updates {
            if let Some(previous) = state.creatures.insert(current.id, current.clone()) {
                changes
                    .creature_updates
                    .insert(current.id, RecordUpdate { previous, current });
            }
        }
        for id in out.despawned_creatures {
            if let Some(creature) = state.creatures.remove(&id) {
                events.push(EventRecord::new(
                    EventKind::CreatureDespawned(id),
                    AbsoluteLocation::containing(creature.location),
                    None,
                ));
                changes.despawned_creatures.push(id);
            }
        }
        for current in out.passive_updates {
            if let Some(previous) = state.passives.insert(current.id, current.clone()) {
                changes
                    .passive_updates
                    .insert(current.id, RecordUpdate { previous, current });
            }
        }
        for id in out.despawned_passives {
            if state.passives.remove(&id).is_some() {
                changes.despawned_passives.push(id);
            }
        }

        follow_up_mutations.extend(out.effects.mutations);
        passive_spawns.extend(out.effects.passives);
        events.extend(out.effects.events);
        creature_spawns.extend(out.creature_spawns);
        scheduled_actions.extend(out.scheduled_actions);
    }

    for scheduled in follow_up_mutations {
        let address = scheduled.mutation.location().cuboid();
        if !state.cuboids.contains_key(&address) {
            tracing::debug!(?address, "follow-up mutation for unloaded cuboid dropped");
            continue;
        }
        state
            .pending_mutations
            .entry(address)
            .or_default()
            .push(scheduled);
    }
    for (id, scheduled) in scheduled_actions {
        if !state.entities.contains_key(&id) {
            tracing::debug!(entity = ?id, "scheduled action for unknown entity dropped");
            continue;
        }
        state.pending_actions.entry(id).or_default().push(scheduled);
    }
    for spawn in creature_spawns {
        let id = EntityId(state.next_creature_id);
        state.next_creature_id -= 1;
        state
            .creatures
            .insert(id, Arc::new(Creature::new(id, spawn.kind, spawn.location)));
        events.push(EventRecord::new(
            EventKind::CreatureSpawned(id),
            AbsoluteLocation::containing(spawn.location),
            None,
        ));
        changes.spawned_creatures.push(id);
    }
    for spawn in passive_spawns {
        let id = PassiveId(state.next_passive_id);
        state.next_passive_id += 1;
        state.passives.insert(
            id,
            Arc::new(Passive {
                id,
                kind: spawn.kind,
                location: spawn.location,
                velocity: spawn.velocity,
                spawned_tick: tick,
            }),
        );
        changes.spawned_passives.push(id);
    }

    WorldSnapshot {
        tick,
        state,
        changes,
        events,
        stats,
    }
}
