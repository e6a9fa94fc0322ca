//! Clients predicting against a live tick coordinator.

use std::sync::Arc;

use cubeworld_client::{
    ClientRunner, ClientWorld, Issued, KnownSet, NullProjectionListener, ProjectionConfig,
    SpeculativeProjection, TickUpdate,
};
use cubeworld_common::{AbsoluteLocation, BlockType, CommitLevel, CuboidAddress, EntityId, ItemType, Vec3};
use cubeworld_cuboid::{BlockTypeAspect, CuboidData};
use cubeworld_kernel::{
    CoordinatorConfig, Entity, EntityAction, TickCoordinator, WorldReader, WorldSnapshot,
};

const TICK_MILLIS: u64 = 50;

fn ground(address: CuboidAddress) -> CuboidData {
    let mut cuboid = CuboidData::filled(address, BlockType::AIR);
    for x in 0..32 {
        for y in 0..32 {
            for z in 0..4 {
                cuboid.set::<BlockTypeAspect>(AbsoluteLocation::new(x, y, z).block(), BlockType::STONE);
            }
        }
    }
    cuboid
}

fn place(x: i32, y: i32) -> EntityAction {
    EntityAction::PlaceBlock {
        target: AbsoluteLocation::new(x, y, 4),
        block: BlockType::STONE,
    }
}

fn same_world(a: &ClientWorld, b: &ClientWorld) -> bool {
    a.cuboids.len() == b.cuboids.len()
        && a.cuboids.iter().all(|(address, cuboid)| {
            b.cuboids
                .get(address)
                .is_some_and(|other| cuboid.changed_blocks(other).is_empty())
        })
        && a.entities == b.entities
}

struct Client {
    id: EntityId,
    known: KnownSet,
    projection: SpeculativeProjection,
    outbox: Vec<Issued>,
}

impl Client {
    fn new(id: EntityId) -> Self {
        Self {
            id,
            known: KnownSet::default(),
            projection: SpeculativeProjection::new(
                id,
                ProjectionConfig::default(),
                Box::new(NullProjectionListener),
            ),
            outbox: Vec::new(),
        }
    }

    fn receive(&mut self, snapshot: &WorldSnapshot) -> usize {
        let update = TickUpdate::for_client(snapshot, self.id, &mut self.known);
        self.projection
            .apply_authoritative_tick(&update, snapshot.tick * TICK_MILLIS)
    }

    fn stone_count(&self) -> u32 {
        self.projection.projected().entities[&self.id]
            .inventory
            .count(ItemType(1))
    }
}

/// One server and a set of clients. Client `i` controls the entity listed
/// `i`th; several clients may observe the same entity.
struct Harness {
    server: TickCoordinator,
    clients: Vec<Client>,
}

impl Harness {
    fn new(players: &[(i32, f32)], observers: &[i32]) -> Self {
        let config = CoordinatorConfig {
            worker_threads: 2,
            max_creatures: 0,
            ..CoordinatorConfig::default()
        };
        let server = TickCoordinator::with_defaults(config).unwrap();
        server.setup_changes_for_tick(
            vec![ground(CuboidAddress::new(0, 0, 0))],
            vec![],
            players
                .iter()
                .map(|&(id, x)| {
                    Entity::new(EntityId(id), Vec3::new(x, 4.5, 4.0)).with_items(ItemType(1), 10)
                })
                .collect(),
            vec![],
        );
        let clients = players
            .iter()
            .map(|&(id, _)| id)
            .chain(observers.iter().copied())
            .map(|id| Client::new(EntityId(id)))
            .collect();
        let mut harness = Self { server, clients };
        harness.tick();
        harness
    }

    fn tick(&mut self) -> Arc<WorldSnapshot> {
        let snapshot = self.server.start_next_tick().unwrap();
        for client in &mut self.clients {
            client.receive(&snapshot);
        }
        snapshot
    }

    fn speculate(&mut self, client: usize, action: EntityAction) -> Option<CommitLevel> {
        let client = &mut self.clients[client];
        let now = client.projection.last_tick() * TICK_MILLIS;
        let commit_level = client.projection.apply_local_action(action.clone(), now)?;
        client.outbox.push(Issued {
            action,
            commit_level,
        });
        Some(commit_level)
    }

    fn flush(&mut self, client: usize) {
        let client = &mut self.clients[client];
        for issued in client.outbox.drain(..) {
            assert!(self.server.enqueue_entity_action(
                client.id,
                issued.action,
                issued.commit_level
            ));
        }
    }
}

#[test]
fn placed_block_is_shown_until_confirmed_and_after() {
    let mut harness = Harness::new(&[(1, 4.5)], &[]);
    let target = AbsoluteLocation::new(6, 4, 4);

    assert_eq!(harness.speculate(0, place(6, 4)), Some(CommitLevel(1)));
    let client = &harness.clients[0];
    assert_eq!(client.projection.projected().block_type_at(target), Some(BlockType::STONE));
    assert_eq!(client.projection.shadow().block_type_at(target), Some(BlockType::AIR));

    harness.flush(0);
    harness.tick();
    let client = &harness.clients[0];
    assert_eq!(client.projection.pending_count(), 0);
    assert_eq!(client.projection.projected().block_type_at(target), Some(BlockType::STONE));

    harness.tick();
    let client = &harness.clients[0];
    assert_eq!(client.projection.shadow().block_type_at(target), Some(BlockType::STONE));
    assert!(same_world(client.projection.projected(), client.projection.shadow()));
}

#[test]
fn conflicting_action_drops_out_while_later_ones_still_apply() {
    let mut harness = Harness::new(&[(1, 4.5), (2, 8.5)], &[]);
    let contested = AbsoluteLocation::new(6, 4, 4);
    let free = AbsoluteLocation::new(5, 5, 4);

    // Player 1 predicts two placements but its packets are slow.
    harness.speculate(0, place(6, 4)).unwrap();
    harness.speculate(0, place(5, 5)).unwrap();
    assert_eq!(harness.clients[0].stone_count(), 8);

    // Player 2 takes the contested block first.
    harness.speculate(1, place(6, 4)).unwrap();
    harness.flush(1);
    harness.tick();
    harness.tick();

    let client = &harness.clients[0];
    assert_eq!(client.projection.pending_count(), 2);
    let applied: Vec<bool> = client.projection.pending().map(|entry| entry.applied).collect();
    assert_eq!(applied, vec![false, true]);
    assert_eq!(client.projection.projected().block_type_at(contested), Some(BlockType::STONE));
    assert_eq!(client.projection.projected().block_type_at(free), Some(BlockType::STONE));
    assert_eq!(client.stone_count(), 9);

    // The server rejects the first and applies the second.
    harness.flush(0);
    let snapshot = harness.tick();
    assert_eq!(snapshot.state.commit_level(EntityId(1)), CommitLevel(2));
    assert_eq!(harness.clients[0].projection.pending_count(), 0);
    harness.tick();

    let client = &harness.clients[0];
    assert_eq!(client.stone_count(), 9);
    assert!(same_world(client.projection.projected(), client.projection.shadow()));
}

#[test]
fn sheared_break_projects_the_same_with_or_without_local_prediction() {
    // Client 0 controls entity 1 and predicts; client 1 observes entity 1 only.
    let mut harness = Harness::new(&[(1, 4.5)], &[1]);
    let target = AbsoluteLocation::new(6, 4, 3);
    let action = EntityAction::Break {
        target,
        millis: 2000,
    };

    harness.speculate(0, action).unwrap();
    assert_eq!(
        harness.clients[0].projection.projected().block_type_at(target),
        Some(BlockType::AIR)
    );
    harness.flush(0);

    harness.tick();
    let (predicting, observing) = (&harness.clients[0], &harness.clients[1]);
    assert_eq!(observing.projection.shadow().block_type_at(target), Some(BlockType::STONE));
    assert_eq!(observing.projection.projected().block_type_at(target), Some(BlockType::AIR));
    assert!(same_world(predicting.projection.projected(), observing.projection.projected()));

    harness.tick();
    let (predicting, observing) = (&harness.clients[0], &harness.clients[1]);
    assert_eq!(observing.projection.shadow().block_type_at(target), Some(BlockType::AIR));
    assert!(same_world(predicting.projection.projected(), observing.projection.projected()));
    assert!(same_world(predicting.projection.projected(), predicting.projection.shadow()));
}

#[test]
fn racing_clients_converge_on_the_server_world() {
    let mut harness = Harness::new(&[(1, 4.5), (2, 8.5)], &[]);
    for round in 0..12 {
        for client in 0..2 {
            let x = 5 + ((round * 3 + client * 2) % 3) as i32;
            let y = 3 + ((round + client) % 3) as i32;
            harness.speculate(client, place(x, y));
        }
        // Each client's packets arrive one tick late.
        harness.tick();
        harness.flush(0);
        harness.flush(1);
    }
    for _ in 0..3 {
        harness.tick();
    }

    let server = harness.server.latest_snapshot();
    for client in &harness.clients {
        let projection = &client.projection;
        assert_eq!(projection.pending_count(), 0);
        assert!(same_world(projection.projected(), projection.shadow()));
        let served = &server.state.cuboids[&CuboidAddress::new(0, 0, 0)];
        let held = &projection.shadow().cuboids[&CuboidAddress::new(0, 0, 0)];
        assert!(served.changed_blocks(held).is_empty());
        assert_eq!(
            projection.shadow().entities[&client.id].inventory,
            server.state.entities[&client.id].inventory
        );
    }
}

#[test]
fn runner_folds_updates_pushed_from_another_thread() {
    let config = CoordinatorConfig {
        worker_threads: 1,
        max_creatures: 0,
        ..CoordinatorConfig::default()
    };
    let mut server = TickCoordinator::with_defaults(config).unwrap();
    server.setup_changes_for_tick(
        vec![ground(CuboidAddress::new(0, 0, 0))],
        vec![],
        vec![Entity::new(EntityId(1), Vec3::new(4.5, 4.5, 4.0)).with_items(ItemType(1), 10)],
        vec![],
    );
    let mut runner = ClientRunner::new(SpeculativeProjection::new(
        EntityId(1),
        ProjectionConfig::default(),
        Box::new(NullProjectionListener),
    ));
    let inbound = runner.inbound();

    let network = std::thread::spawn(move || {
        let mut known = KnownSet::default();
        for _ in 0..3 {
            let snapshot = server.start_next_tick().unwrap();
            inbound.push(TickUpdate::for_client(&snapshot, EntityId(1), &mut known));
        }
    });
    network.join().unwrap();

    assert_eq!(runner.run_pending(150), 0);
    assert_eq!(runner.projection().last_tick(), 3);
    assert!(runner.submit(place(6, 4), 160).is_some());
    assert_eq!(runner.take_outbound().len(), 1);
}
