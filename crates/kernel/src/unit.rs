use crate::action::{ActionContext, EntityAction};
use crate::config::CoordinatorConfig;
use crate::creature::{CreatureBrain, CreatureIntent};
use crate::entity::{Creature, CreatureSpawn, Entity, Passive, PassiveKind};
use crate::mutation::BlockMutation;
use crate::operator::OperatorCommand;
use crate::partition::{ColumnWork, WorkUnit};
use crate::physics::{Body, Physics};
use crate::reader::Effects;
use crate::rng::tick_random;
use crate::scheduled::{
    CommittedAction, ScheduledAction, ScheduledMutation, split_blocking, split_independent,
};
use crate::snapshot::WorldState;
use cubeworld_common::{
    AbsoluteLocation, BlockType, CommitLevel, CuboidAddress, EntityId, PassiveId, Vec3,
};
use cubeworld_cuboid::{CuboidUpdate, MutableCuboid};
use std::sync::Arc;

/// Subject id the spawn unit draws randomness for; no entity uses zero.
const SPAWN_SUBJECT: i64 = 0;

/// Read-only inputs shared by every unit of one tick.
pub(crate) struct UnitContext<'a> {
    pub tick: u64,
    pub state: &'a WorldState,
    pub config: &'a CoordinatorConfig,
    pub physics: &'a dyn Physics,
    pub brain: &'a dyn CreatureBrain,
    pub operator_commands: &'a [OperatorCommand],
}

/// Private result of one unit, merged in unit order at the end of the tick.
#[derive(Debug, Default)]
pub(crate) struct UnitOutput {
    pub unit: usize,
    pub cuboid_updates: Vec<CuboidUpdate>,
    pub carried_mutations: Vec<(CuboidAddress, Vec<ScheduledMutation>)>,
    pub committed_mutations: Vec<(CuboidAddress, Vec<BlockMutation>)>,
    pub entity_updates: Vec<Arc<Entity>>,
    pub carried_actions: Vec<(EntityId, Vec<ScheduledAction>)>,
    pub committed_actions: Vec<(EntityId, Vec<CommittedAction>)>,
    pub commit_levels: Vec<(EntityId, CommitLevel)>,
    pub creature_updates: Vec<Arc<Creature>>,
    pub despawned_creatures: Vec<EntityId>,
    pub passive_updates: Vec<Arc<Passive>>,
    pub despawned_passives: Vec<PassiveId>,
    /// Follow-ups for the next tick.
    pub effects: Effects,
    pub creature_spawns: Vec<CreatureSpawn>,
    pub scheduled_actions: Vec<(EntityId, ScheduledAction)>,
    pub mutations_applied: usize,
    pub mutations_failed: usize,
    pub actions_applied: usize,
    pub actions_failed: usize,
}

impl UnitOutput {
    pub fn new(unit: usize) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }
}

pub(crate) fn run_unit(ctx: &UnitContext<'_>, unit: &WorkUnit, out: &mut UnitOutput) {
    match unit {
        WorkUnit::Column(work) => run_column(ctx, work, out),
        WorkUnit::SpawnCreature => run_spawn(ctx, out),
        WorkUnit::OperatorCommands => run_operator_commands(ctx, out),
    }
}

/// Cuboid mutations first, then entity actions, then creatures and passives.
fn run_column(ctx: &UnitContext<'_>, work: &ColumnWork, out: &mut UnitOutput) {
    for address in &work.cuboids {
        run_mutations(ctx, *address, out);
    }
    for id in &work.entities {
        run_actions(ctx, *id, out);
    }
    for id in &work.creatures {
        run_creature(ctx, *id, out);
    }
    for id in &work.passives {
        run_passive(ctx, *id, out);
    }
}

fn run_mutations(ctx: &UnitContext<'_>, address: CuboidAddress, out: &mut UnitOutput) {
    let (Some(queue), Some(cuboid)) = (
        ctx.state.pending_mutations.get(&address),
        ctx.state.cuboids.get(&address),
    ) else {
        return;
    };
    let (ready, carried) = split_independent(queue, ctx.config.millis_per_tick);
    if !carried.is_empty() {
        out.carried_mutations.push((address, carried));
    }
    if ready.is_empty() {
        return;
    }

    let mut session = MutableCuboid::new(cuboid.clone());
    let mut committed = Vec::new();
    for scheduled in ready {
        let mut effects = Effects::default();
        match scheduled.mutation.apply(&mut session, ctx.state, &mut effects) {
            Ok(()) => {
                out.effects.append(effects);
                committed.push(scheduled.mutation);
                out.mutations_applied += 1;
            }
            Err(error) => {
                tracing::debug!(?address, %error, "mutation failed");
                out.mutations_failed += 1;
            }
        }
    }
    if !committed.is_empty() {
        out.committed_mutations.push((address, committed));
    }
    if let Some(update) = session.commit() {
        out.cuboid_updates.push(update);
    }
}

fn run_actions(ctx: &UnitContext<'_>, id: EntityId, out: &mut UnitOutput) {
    let (Some(queue), Some(entity)) = (
        ctx.state.pending_actions.get(&id),
        ctx.state.entities.get(&id),
    ) else {
        return;
    };
    let (ready, carried) = split_blocking(queue, ctx.config.millis_per_tick);
    if !carried.is_empty() {
        out.carried_actions.push((id, carried));
    }
    if ready.is_empty() {
        return;
    }

    let action_ctx = ActionContext {
        world: ctx.state,
        physics: ctx.physics,
    };
    let previous_level = ctx.state.commit_level(id);
    let mut level = previous_level;
    let mut current = Entity::clone(entity);
    let mut committed = Vec::new();
    for scheduled in ready {
        let mut candidate = current.clone();
        let mut effects = Effects::default();
        match scheduled.action.apply(&mut candidate, &action_ctx, &mut effects) {
            Ok(()) => {
                candidate.ephemeral.last_action_tick = ctx.tick;
                current = candidate;
                out.effects.append(effects);
                committed.push(CommittedAction {
                    action: scheduled.action,
                    commit_level: scheduled.commit_level,
                });
                out.actions_applied += 1;
            }
            Err(error) => {
                tracing::debug!(entity = ?id, commit = %scheduled.commit_level, %error, "action failed");
                out.actions_failed += 1;
            }
        }
        // Failed actions are consumed too; only carried ones hold the level back.
        level = level.max(scheduled.commit_level);
    }
    if level > previous_level {
        out.commit_levels.push((id, level));
    }
    if !committed.is_empty() {
        out.committed_actions.push((id, committed));
    }
    if current != **entity {
        out.entity_updates.push(Arc::new(current));
    }
}

fn run_creature(ctx: &UnitContext<'_>, id: EntityId, out: &mut UnitOutput) {
    let Some(creature) = ctx.state.creatures.get(&id) else {
        return;
    };
    if creature.health == 0 {
        out.despawned_creatures.push(id);
        return;
    }
    let random = tick_random(ctx.config.world_seed, ctx.tick, id.0 as i64);
    let mut next = Creature::clone(creature);
    match ctx.brain.intent(ctx.state, creature, random) {
        CreatureIntent::Despawn => {
            out.despawned_creatures.push(id);
            return;
        }
        CreatureIntent::Idle => {
            next.velocity.x = 0.0;
            next.velocity.y = 0.0;
        }
        CreatureIntent::Walk { direction } => {
            let velocity = direction * creature.kind.speed();
            next.velocity.x = velocity.x;
            next.velocity.y = velocity.y;
            next.ephemeral.wander_target =
                Some(AbsoluteLocation::containing(creature.location + direction));
        }
    }
    let body = ctx.physics.step(
        ctx.state,
        Body {
            location: next.location,
            velocity: next.velocity,
        },
        ctx.config.millis_per_tick,
    );
    next.location = body.location;
    next.velocity = body.velocity;
    if next != **creature {
        out.creature_updates.push(Arc::new(next));
    }
}

fn run_passive(ctx: &UnitContext<'_>, id: PassiveId, out: &mut UnitOutput) {
    let Some(passive) = ctx.state.passives.get(&id) else {
        return;
    };
    if let PassiveKind::ItemStack { .. } = passive.kind {
        if ctx.tick.saturating_sub(passive.spawned_tick) >= ctx.config.passive_lifetime_ticks {
            out.despawned_passives.push(id);
            return;
        }
    }
    let body = ctx.physics.step(
        ctx.state,
        Body {
            location: passive.location,
            velocity: passive.velocity,
        },
        ctx.config.millis_per_tick,
    );
    if let PassiveKind::FallingBlock { block } = passive.kind {
        if body.velocity == Vec3::ZERO {
            // Landed: turn back into a block where it came to rest.
            out.effects.schedule(
                BlockMutation::ReplaceBlock {
                    location: AbsoluteLocation::containing(body.location),
                    expected: BlockType::AIR,
                    replacement: block,
                },
                0,
            );
            out.despawned_passives.push(id);
            return;
        }
    }
    if body.location != passive.location || body.velocity != passive.velocity {
        out.passive_updates.push(Arc::new(Passive {
            location: body.location,
            velocity: body.velocity,
            ..Passive::clone(passive)
        }));
    }
}

fn run_spawn(ctx: &UnitContext<'_>, out: &mut UnitOutput) {
    if ctx.state.creatures.len() >= ctx.config.max_creatures {
        return;
    }
    let random = tick_random(ctx.config.world_seed, ctx.tick, SPAWN_SUBJECT);
    if let Some(spawn) = ctx.brain.spawn(&ctx.state.cuboids, random) {
        out.creature_spawns.push(spawn);
    }
}

fn run_operator_commands(ctx: &UnitContext<'_>, out: &mut UnitOutput) {
    for command in ctx.operator_commands {
        tracing::debug!(?command, "operator command");
        match command {
            OperatorCommand::SetBlock { location, block } => out.effects.schedule(
                BlockMutation::SetBlock {
                    location: *location,
                    block: *block,
                },
                0,
            ),
            OperatorCommand::SubmitAction {
                entity,
                action,
                delay_millis,
            } => out.scheduled_actions.push((
                *entity,
                ScheduledAction {
                    action: action.clone(),
                    commit_level: CommitLevel::NONE,
                    delay_millis: *delay_millis,
                },
            )),
            OperatorCommand::SpawnCreature { kind, location } => {
                out.creature_spawns.push(CreatureSpawn {
                    kind: *kind,
                    location: *location,
                })
            }
            OperatorCommand::Heal { entity, amount } => out.scheduled_actions.push((
                *entity,
                ScheduledAction {
                    action: EntityAction::Heal { amount: *amount },
                    commit_level: CommitLevel::NONE,
                    delay_millis: 0,
                },
            )),
        }
    }
}
