use crate::action::EntityAction;
use crate::config::CoordinatorConfig;
use crate::creature::{CreatureBrain, WanderingBrain};
use crate::entity::Entity;
use crate::error::{CoordinatorError, QueueError};
use crate::inbound::InboundQueues;
use crate::listener::{NoopListener, TickListener, notify};
use crate::operator::OperatorCommand;
use crate::physics::{Physics, SimplePhysics};
use crate::snapshot::{WorldSnapshot, WorldState};
use crate::tick::{TickPlan, merge, prepare};
use crate::timing::TickStats;
use crate::unit::{UnitContext, UnitOutput, run_unit};
use cubeworld_common::{CommitLevel, CuboidAddress, EntityId};
use cubeworld_cuboid::CuboidData;
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Pluggable policies the coordinator calls into.
#[derive(Clone)]
pub struct TickHooks {
    pub physics: Arc<dyn Physics>,
    pub brain: Arc<dyn CreatureBrain>,
    pub listener: Arc<dyn TickListener>,
}

impl Default for TickHooks {
    fn default() -> Self {
        Self {
            physics: Arc::new(SimplePhysics::default()),
            brain: Arc::new(WanderingBrain),
            listener: Arc::new(NoopListener),
        }
    }
}

#[derive(Default)]
struct Control {
    requested: u64,
    completed: u64,
    shutdown: bool,
}

struct PhaseClock {
    preamble: Duration,
    parallel_started: Instant,
}

struct Shared {
    config: CoordinatorConfig,
    hooks: TickHooks,
    inbound: Arc<InboundQueues>,
    barrier: Barrier,
    control: Mutex<Control>,
    control_changed: Condvar,
    plan: RwLock<Option<Arc<TickPlan>>>,
    /// Unit outputs per worker, indexed by worker number.
    slots: Vec<Mutex<Vec<UnitOutput>>>,
    clock: Mutex<PhaseClock>,
    latest: RwLock<Arc<WorldSnapshot>>,
}

/// Runs ticks on a fixed pool of worker threads.
///
/// Each tick has three phases separated by barriers: a preamble on one
/// thread (drain inbound queues, apply loads and unloads, partition), a
/// parallel phase where workers claim units through an atomic counter, and a
/// postamble on one thread (merge in unit order, publish, notify). The merge
/// never depends on which worker ran which unit.
pub struct TickCoordinator {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TickCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        initial: WorldSnapshot,
        hooks: TickHooks,
    ) -> Result<Self, CoordinatorError> {
        let threads = config.worker_count();
        let shared = Arc::new(Shared {
            inbound: Arc::new(InboundQueues::new(config.max_pending_actions_per_entity)),
            barrier: Barrier::new(threads),
            control: Mutex::new(Control::default()),
            control_changed: Condvar::new(),
            plan: RwLock::new(None),
            slots: (0..threads).map(|_| Mutex::new(Vec::new())).collect(),
            clock: Mutex::new(PhaseClock {
                preamble: Duration::ZERO,
                parallel_started: Instant::now(),
            }),
            latest: RwLock::new(Arc::new(initial)),
            config,
            hooks,
        });

        let mut coordinator = Self {
            shared: shared.clone(),
            workers: Vec::with_capacity(threads),
        };
        for index in 0..threads {
            let shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("tick-worker-{index}"))
                .spawn(move || run_worker(shared, index))?;
            coordinator.workers.push(handle);
        }
        tracing::info!(threads, "tick coordinator started");
        Ok(coordinator)
    }

    /// An empty world with default hooks.
    pub fn with_defaults(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        Self::new(config, WorldSnapshot::default(), TickHooks::default())
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Handle for threads that feed the coordinator (network, loaders).
    pub fn inbound(&self) -> Arc<InboundQueues> {
        self.shared.inbound.clone()
    }

    /// Queue cuboid and entity loads and unloads for the next tick's preamble.
    pub fn setup_changes_for_tick(
        &self,
        cuboid_loads: Vec<CuboidData>,
        cuboid_unloads: Vec<CuboidAddress>,
        entity_loads: Vec<Entity>,
        entity_unloads: Vec<EntityId>,
    ) {
        let inbound = &self.shared.inbound;
        inbound.unload_cuboids(cuboid_unloads);
        inbound.load_cuboids(cuboid_loads);
        inbound.unload_entities(entity_unloads);
        inbound.load_entities(entity_loads);
    }

    /// Queue a client action. `false` means the client is flooding and
    /// should be disconnected.
    pub fn enqueue_entity_action(
        &self,
        entity: EntityId,
        action: EntityAction,
        commit_level: CommitLevel,
    ) -> bool {
        self.try_enqueue_entity_action(entity, action, commit_level)
            .is_ok()
    }

    pub fn try_enqueue_entity_action(
        &self,
        entity: EntityId,
        action: EntityAction,
        commit_level: CommitLevel,
    ) -> Result<(), QueueError> {
        self.shared
            .inbound
            .enqueue_action(entity, action, commit_level)
    }

    pub fn enqueue_operator_command(&self, command: OperatorCommand) {
        self.shared.inbound.enqueue_operator_command(command);
    }

    /// Run one tick to completion and return the snapshot it published.
    pub fn start_next_tick(&mut self) -> Result<Arc<WorldSnapshot>, CoordinatorError> {
        let shared = &self.shared;
        let mut control = shared.control.lock();
        if control.shutdown {
            return Err(CoordinatorError::ShutDown);
        }
        control.requested += 1;
        let target = control.requested;
        shared.control_changed.notify_all();
        while control.completed < target {
            shared.control_changed.wait(&mut control);
        }
        drop(control);
        Ok(self.latest_snapshot())
    }

    /// The most recently published snapshot; readers never block a tick.
    pub fn latest_snapshot(&self) -> Arc<WorldSnapshot> {
        self.shared.latest.read().clone()
    }

    /// Stop the workers after the current tick. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut control = self.shared.control.lock();
            if control.shutdown {
                return;
            }
            control.shutdown = true;
            self.shared.control_changed.notify_all();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("tick worker exited by panic");
            }
        }
        tracing::info!("tick coordinator stopped");
    }
}

impl Drop for TickCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A panicking unit would leave the other workers waiting at a barrier
/// forever, and the world can no longer be trusted, so the process aborts.
fn run_worker(shared: Arc<Shared>, index: usize) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| worker_loop(&shared, index)));
    if result.is_err() {
        tracing::error!(worker = index, "tick worker panicked, aborting");
        std::process::abort();
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    let mut seen = 0;
    loop {
        {
            let mut control = shared.control.lock();
            while !control.shutdown && control.requested == seen {
                shared.control_changed.wait(&mut control);
            }
            if control.shutdown {
                return;
            }
            seen += 1;
        }

        if shared.barrier.wait().is_leader() {
            shared.preamble();
        }
        shared.barrier.wait();
        shared.run_units(index);
        if shared.barrier.wait().is_leader() {
            shared.postamble();
        }
    }
}

fn queued_actions(state: &WorldState) -> impl Iterator<Item = (EntityId, usize)> + '_ {
    state
        .pending_actions
        .iter()
        .map(|(id, queue)| (*id, queue.len()))
}

impl Shared {
    fn preamble(&self) {
        let started = Instant::now();
        let previous = self.latest.read().clone();
        let _span = tracing::info_span!("tick_preamble", tick = previous.tick + 1).entered();
        let plan = prepare(&previous, self.inbound.drain());
        self.inbound.set_carried(queued_actions(&plan.state));
        tracing::debug!(units = plan.units.len(), "tick prepared");
        *self.plan.write() = Some(Arc::new(plan));
        *self.clock.lock() = PhaseClock {
            preamble: started.elapsed(),
            parallel_started: Instant::now(),
        };
    }

    fn run_units(&self, index: usize) {
        let Some(plan) = self.plan.read().clone() else {
            return;
        };
        let _span = tracing::info_span!("tick_parallel", tick = plan.tick, worker = index).entered();
        let ctx = UnitContext {
            tick: plan.tick,
            state: &plan.state,
            config: &self.config,
            physics: self.hooks.physics.as_ref(),
            brain: self.hooks.brain.as_ref(),
            operator_commands: &plan.operator_commands,
        };
        let mut outputs = Vec::new();
        loop {
            let unit = plan.next_unit.fetch_add(1, Ordering::Relaxed);
            let Some(work) = plan.units.get(unit) else {
                break;
            };
            let mut out = UnitOutput::new(unit);
            run_unit(&ctx, work, &mut out);
            tracing::trace!(unit, "unit done");
            outputs.push(out);
        }
        *self.slots[index].lock() = outputs;
    }

    fn postamble(&self) {
        let plan = self.plan.write().take();
        if let Some(plan) = plan {
            let _span = tracing::info_span!("tick_postamble", tick = plan.tick).entered();
            let (preamble, parallel) = {
                let clock = self.clock.lock();
                (clock.preamble, clock.parallel_started.elapsed())
            };
            let started = Instant::now();

            let mut units_per_thread = Vec::with_capacity(self.slots.len());
            let mut outputs = Vec::with_capacity(plan.units.len());
            for slot in &self.slots {
                let mut slot = slot.lock();
                units_per_thread.push(slot.len());
                outputs.append(&mut slot);
            }
            outputs.sort_by_key(|out| out.unit);

            let stats = TickStats {
                preamble,
                parallel,
                units: plan.units.len(),
                units_per_thread,
                ..TickStats::default()
            };
            let mut snapshot = merge(&plan, outputs, stats);
            snapshot.stats.postamble = started.elapsed();
            let snapshot = Arc::new(snapshot);
            self.inbound.set_carried(queued_actions(&snapshot.state));
            *self.latest.write() = snapshot.clone();
            notify(self.hooks.listener.as_ref(), &snapshot);
            tracing::debug!(
                tick = snapshot.tick,
                mutations = snapshot.stats.mutations_applied,
                actions = snapshot.stats.actions_applied,
                "tick published"
            );
        }

        let mut control = self.control.lock();
        control.completed += 1;
        self.control_changed.notify_all();
    }
}
