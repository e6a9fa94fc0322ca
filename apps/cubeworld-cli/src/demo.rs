use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use cubeworld_client::{KnownSet, NullProjectionListener, ProjectionConfig, SpeculativeProjection, TickUpdate};
use cubeworld_common::{AbsoluteLocation, BlockType, CommitLevel, CuboidAddress, EntityId, ItemType, Vec3};
use cubeworld_cuboid::{BlockTypeAspect, CuboidData, LightAspect};
use cubeworld_kernel::{
    CoordinatorConfig, CreatureKind, Entity, EntityAction, OperatorCommand, TickCoordinator,
    TickHooks, TickTimer, WorldSnapshot, WorldState,
};
use tracing::info;

/// Read a coordinator config from a JSON file, or start from defaults, then
/// apply command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    threads: Option<usize>,
    seed: Option<u64>,
) -> anyhow::Result<CoordinatorConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            CoordinatorConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CoordinatorConfig::default(),
    };
    if let Some(threads) = threads {
        config.worker_threads = threads;
    }
    if let Some(seed) = seed {
        config.world_seed = seed;
    }
    Ok(config)
}

/// A stone slab, four blocks deep, with a lit strip along one edge.
pub fn ground(address: CuboidAddress) -> CuboidData {
    let mut cuboid = CuboidData::filled(address, BlockType::AIR);
    for x in 0..32 {
        for y in 0..32 {
            for z in 0..4 {
                let block = AbsoluteLocation::new(x, y, z).block();
                cuboid.set::<BlockTypeAspect>(block, BlockType::STONE);
            }
            if x == 0 {
                cuboid.set::<LightAspect>(AbsoluteLocation::new(x, y, 4).block(), 15);
            }
        }
    }
    cuboid
}

/// `side` x `side` cuboids of ground with one player standing in the middle
/// of each of the first `players` cuboids.
pub fn demo_world(side: i16, players: usize) -> WorldState {
    let mut state = WorldState::default();
    for x in 0..side {
        for y in 0..side {
            let address = CuboidAddress::new(x, y, 0);
            state.cuboids.insert(address, Arc::new(ground(address)));
        }
    }
    for (i, address) in state.cuboids.keys().copied().take(players).enumerate() {
        let id = EntityId(i as i32 + 1);
        let base = address.base();
        let location = Vec3::new(base.x as f32 + 16.5, base.y as f32 + 16.5, 4.0);
        state
            .entities
            .insert(id, Arc::new(Entity::new(id, location).with_items(ItemType(1), 32)));
    }
    state
}

/// The scripted player loop: place a block, break it in two increments,
/// then reset.
pub fn scripted_action(entity: &Entity, tick: u64) -> Option<EntityAction> {
    let target = entity.block_location().relative(1, 0, 0);
    match tick % 6 {
        0 => Some(EntityAction::PlaceBlock {
            target,
            block: BlockType::STONE,
        }),
        2 | 3 => Some(EntityAction::Break {
            target,
            millis: 1000,
        }),
        4 => Some(EntityAction::CancelActivity),
        _ => None,
    }
}

pub struct RunReport {
    pub snapshot: Arc<WorldSnapshot>,
    pub timer: TickTimer,
    pub digests: Vec<String>,
    pub client_pending: usize,
    pub client_in_sync: bool,
}

/// Run the scripted demo for `ticks` ticks. Player 1 is also followed by a
/// predicting client that submits the same actions it sends.
pub fn run(config: CoordinatorConfig, side: i16, players: usize, ticks: u64) -> anyhow::Result<RunReport> {
    let state = demo_world(side, players);
    let millis_per_tick = config.millis_per_tick;
    let mut coordinator =
        TickCoordinator::new(config, WorldSnapshot::initial(state), TickHooks::default())
            .context("starting tick workers")?;

    let local = EntityId(1);
    let mut known = KnownSet::default();
    let mut client = SpeculativeProjection::new(
        local,
        ProjectionConfig {
            millis_per_tick,
            ..ProjectionConfig::default()
        },
        Box::new(NullProjectionListener),
    );
    let first = TickUpdate::for_client(&coordinator.latest_snapshot(), local, &mut known);
    client.apply_authoritative_tick(&first, 0);

    let mut timer = TickTimer::new(64);
    let mut digests = Vec::with_capacity(ticks as usize);
    let mut commit_levels = vec![CommitLevel::NONE; players];
    for tick in 0..ticks {
        let snapshot = coordinator.latest_snapshot();
        for (id, entity) in &snapshot.state.entities {
            let Some(action) = scripted_action(entity, tick) else {
                continue;
            };
            if *id == local {
                // Only what the client accepts is sent, numbered by the client.
                if let Some(commit_level) = client.apply_local_action(action.clone(), tick * millis_per_tick) {
                    coordinator.enqueue_entity_action(*id, action, commit_level);
                }
                continue;
            }
            let slot = &mut commit_levels[(id.0 - 1) as usize];
            *slot = slot.next();
            if !coordinator.enqueue_entity_action(*id, action, *slot) {
                tracing::warn!(entity = id.0, "entity queue refused action");
            }
        }
        if tick % 50 == 25 {
            if let Some(entity) = snapshot.state.entities.get(&local) {
                coordinator.enqueue_operator_command(OperatorCommand::SpawnCreature {
                    kind: CreatureKind::Cow,
                    location: entity.location + Vec3::new(-3.0, 0.0, 3.0),
                });
            }
        }

        let snapshot = coordinator.start_next_tick()?;
        timer.record(snapshot.stats.total());
        digests.push(snapshot.digest_hex()?);
        let update = TickUpdate::for_client(&snapshot, local, &mut known);
        client.apply_authoritative_tick(&update, (tick + 1) * millis_per_tick);
        if snapshot.tick % 100 == 0 {
            info!(tick = snapshot.tick, avg = ?timer.average(), "progress");
        }
    }

    // Let outstanding follow-ups land.
    for _ in 0..2 {
        let snapshot = coordinator.start_next_tick()?;
        digests.push(snapshot.digest_hex()?);
        let update = TickUpdate::for_client(&snapshot, local, &mut known);
        client.apply_authoritative_tick(&update, snapshot.tick * millis_per_tick);
    }

    let client_in_sync = client.projected().cuboids.iter().all(|(address, cuboid)| {
        client
            .shadow()
            .cuboids
            .get(address)
            .is_some_and(|confirmed| cuboid.changed_blocks(confirmed).is_empty())
    }) && client.projected().entities == client.shadow().entities;

    Ok(RunReport {
        snapshot: coordinator.latest_snapshot(),
        timer,
        digests,
        client_pending: client.pending_count(),
        client_in_sync,
    })
}
