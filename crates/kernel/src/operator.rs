use crate::action::EntityAction;
use crate::entity::CreatureKind;
use cubeworld_common::{AbsoluteLocation, BlockType, EntityId, Vec3};
use serde::{Deserialize, Serialize};

/// Administrative command, run by the single-shot operator unit.
///
/// Commands never change state in the tick that runs them; their effects are
/// queued and land in the following tick like any other follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorCommand {
    SetBlock {
        location: AbsoluteLocation,
        block: BlockType,
    },
    /// Queue an action for an entity without a client commit level.
    SubmitAction {
        entity: EntityId,
        action: EntityAction,
        delay_millis: u64,
    },
    SpawnCreature {
        kind: CreatureKind,
        location: Vec3,
    },
    Heal {
        entity: EntityId,
        amount: u8,
    },
}
