//! Tick kernel: authoritative world state advanced in parallel ticks and
//! published as immutable snapshots.
//!
//! # Invariants
//! - Within a tick every unit reads the previous snapshot; nothing a unit
//!   writes is visible to another unit before the merge.
//! - The merge runs in unit order, so results never depend on thread count
//!   or scheduling.
//! - Follow-up work scheduled during a tick applies in a later tick.
//! - Records a tick does not change keep their previous allocation.

mod action;
mod config;
mod coordinator;
mod creature;
mod entity;
mod error;
mod event;
mod inbound;
mod inspect;
mod listener;
mod mutation;
mod operator;
mod partition;
mod physics;
mod reader;
mod rng;
mod scheduled;
mod snapshot;
mod tick;
mod timing;
mod unit;

pub use action::{ActionContext, ActionError, EntityAction, MAX_STEP, REACH};
pub use config::CoordinatorConfig;
pub use coordinator::{TickCoordinator, TickHooks};
pub use creature::{CreatureBrain, CreatureIntent, WanderingBrain};
pub use entity::{
    Creature, CreatureEphemeral, CreatureKind, CreatureSpawn, ENTITY_INVENTORY_CAPACITY, Entity,
    EntityEphemeral, MAX_BREATH, MAX_HEALTH, Passive, PassiveKind, PassiveSpawn, RecordUpdate,
};
pub use error::{CoordinatorError, QueueError, SnapshotError};
pub use event::{EventKind, EventRecord};
pub use inbound::{InboundAction, InboundBatch, InboundQueues};
pub use inspect::{EntityInfo, WorldInspector, WorldSummary};
pub use listener::{NoopListener, TickListener};
pub use mutation::{BLOCK_INVENTORY_CAPACITY, BlockMutation, MAX_LIGHT, MutationError, toughness};
pub use operator::OperatorCommand;
pub use partition::{ColumnWork, WorkUnit, column_of, partition};
pub use physics::{Body, Physics, SimplePhysics};
pub use reader::{Effects, WorldReader};
pub use rng::{splitmix64, tick_random};
pub use scheduled::{
    CommittedAction, Delayed, ScheduledAction, ScheduledMutation, split_blocking,
    split_independent,
};
pub use snapshot::{TickChanges, WorldSnapshot, WorldState};
pub use timing::{TickStats, TickTimer};

/// Crate version, for tooling banners.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
