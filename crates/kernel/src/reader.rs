use crate::entity::PassiveSpawn;
use crate::event::EventRecord;
use crate::mutation::BlockMutation;
use crate::scheduled::ScheduledMutation;
use cubeworld_common::{AbsoluteLocation, BlockType, CuboidAddress};
use cubeworld_cuboid::CuboidData;

/// Read-only view of loaded cuboids.
///
/// On the server this is the previous tick's snapshot, so reads that cross a
/// cuboid boundary never observe another unit's in-flight writes.
pub trait WorldReader {
    fn cuboid(&self, address: CuboidAddress) -> Option<&CuboidData>;

    /// `None` when the containing cuboid is not loaded.
    fn block_type_at(&self, location: AbsoluteLocation) -> Option<BlockType> {
        self.cuboid(location.cuboid())
            .map(|cuboid| cuboid.block_type(location.block()))
    }

    /// Unloaded space counts as solid so nothing walks or falls into it.
    fn is_solid(&self, location: AbsoluteLocation) -> bool {
        self.block_type_at(location)
            .is_none_or(|block| block.is_solid())
    }
}

/// Side effects produced while applying one mutation or action.
///
/// The caller keeps them only if the application succeeded.
#[derive(Debug, Default)]
pub struct Effects {
    pub mutations: Vec<ScheduledMutation>,
    pub passives: Vec<PassiveSpawn>,
    pub events: Vec<EventRecord>,
}

impl Effects {
    pub fn schedule(&mut self, mutation: BlockMutation, delay_millis: u64) {
        self.mutations.push(ScheduledMutation {
            mutation,
            delay_millis,
        });
    }

    pub fn append(&mut self, other: Effects) {
        self.mutations.extend(other.mutations);
        self.passives.extend(other.passives);
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.passives.is_empty() && self.events.is_empty()
    }
}
