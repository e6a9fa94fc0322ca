use cubeworld_common::EntityId;
use cubeworld_cuboid::CodecError;

/// Refusal to accept an inbound action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Too many actions waiting; the sender should be disconnected.
    #[error("entity {entity:?} has {pending} pending actions, limit reached")]
    Flooded { entity: EntityId, pending: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("coordinator has shut down")]
    ShutDown,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cuboid encoding failed: {0}")]
    Codec(#[from] CodecError),
    #[error("record encoding failed: {0}")]
    Encode(String),
}
