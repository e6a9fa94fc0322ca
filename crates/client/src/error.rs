use cubeworld_common::{CuboidAddress, EntityId};
use cubeworld_kernel::{ActionError, MutationError};

/// Why something could not be applied to a client-side world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("cuboid {0:?} is not loaded")]
    CuboidNotLoaded(CuboidAddress),
    #[error("entity {0:?} is not loaded")]
    EntityNotLoaded(EntityId),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Action(#[from] ActionError),
}
