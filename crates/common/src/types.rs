use serde::{Deserialize, Serialize};

/// Identifier shared by players and creatures.
///
/// Players are allocated positive ids, creatures negative ones, so the two
/// spaces never collide even though they share one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl EntityId {
    pub fn is_player(self) -> bool {
        self.0 > 0
    }

    pub fn is_creature(self) -> bool {
        self.0 < 0
    }
}

/// Identifier of a passive object (item stack, falling block). Its own positive space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassiveId(pub i32);

/// Per-player sequence number correlating a speculative action with its
/// authoritative resolution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CommitLevel(pub u64);

impl CommitLevel {
    pub const NONE: CommitLevel = CommitLevel(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for CommitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Block type id. Only the ids the simulation core needs to reason about are
/// named here; the content catalogue lives outside the core.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockType(pub u16);

impl BlockType {
    pub const AIR: BlockType = BlockType(0);
    pub const STONE: BlockType = BlockType(1);
    pub const DIRT: BlockType = BlockType(2);
    pub const SAND: BlockType = BlockType(3);
    pub const PLANK: BlockType = BlockType(4);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Everything but air blocks movement.
    pub fn is_solid(self) -> bool {
        !self.is_air()
    }

    /// The item dropped when this block is broken, if any.
    pub fn as_item(self) -> Option<ItemType> {
        if self.is_air() {
            None
        } else {
            Some(ItemType(self.0))
        }
    }
}

/// Item type id. Item ids below [`ItemType::FIRST_NON_BLOCK`] place as the block with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemType(pub u16);

impl ItemType {
    pub const FIRST_NON_BLOCK: u16 = 256;

    pub fn as_block(self) -> Option<BlockType> {
        if self.0 == 0 || self.0 >= Self::FIRST_NON_BLOCK {
            None
        } else {
            Some(BlockType(self.0))
        }
    }
}
