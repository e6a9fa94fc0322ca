use crate::aspect::{
    Aspect, AspectKind, BlockTypeAspect, DamageAspect, InventoryAspect, LightAspect, LogicAspect,
};
use crate::cuboid::CuboidData;
use crate::inventory::Inventory;
use cubeworld_common::{AbsoluteLocation, BlockAddress, BlockType};
use std::sync::Arc;

/// Read-only view of one block in one cuboid version.
#[derive(Debug, Clone, Copy)]
pub struct BlockProxy<'a> {
    cuboid: &'a CuboidData,
    block: BlockAddress,
}

impl<'a> BlockProxy<'a> {
    pub fn new(cuboid: &'a CuboidData, block: BlockAddress) -> Self {
        Self { cuboid, block }
    }

    pub fn get<A: Aspect>(&self) -> &'a A::Value {
        self.cuboid.get::<A>(self.block)
    }

    pub fn block_type(&self) -> BlockType {
        *self.get::<BlockTypeAspect>()
    }

    pub fn damage(&self) -> u16 {
        *self.get::<DamageAspect>()
    }

    pub fn inventory(&self) -> Option<&'a Inventory> {
        self.get::<InventoryAspect>().as_ref()
    }
}

/// Buffered, not yet committed aspect writes for one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockWrites {
    pub(crate) block_type: Option<BlockType>,
    pub(crate) damage: Option<u16>,
    pub(crate) light: Option<u8>,
    pub(crate) logic: Option<u8>,
    pub(crate) inventory: Option<Option<Inventory>>,
}

/// Single-tick write buffer bound to one block of one cuboid version.
///
/// Reads see buffered writes first, then the bound cuboid. Nothing reaches
/// the cuboid until [`MutableBlockProxy::write_back`], and a buffered value
/// equal to what was read is not a change.
#[derive(Debug, Clone)]
pub struct MutableBlockProxy {
    location: AbsoluteLocation,
    read: Arc<CuboidData>,
    writes: BlockWrites,
}

impl MutableBlockProxy {
    pub fn new(location: AbsoluteLocation, read: Arc<CuboidData>) -> Self {
        assert_eq!(
            location.cuboid(),
            read.address(),
            "proxy location outside its cuboid"
        );
        Self {
            location,
            read,
            writes: BlockWrites::default(),
        }
    }

    pub fn location(&self) -> AbsoluteLocation {
        self.location
    }

    pub fn get<A: Aspect>(&self) -> A::Value {
        match A::pending(&self.writes) {
            Some(value) => value.clone(),
            None => self.read.get::<A>(self.location.block()).clone(),
        }
    }

    pub fn set<A: Aspect>(&mut self, value: A::Value) {
        *A::pending_mut(&mut self.writes) = Some(value);
    }

    pub fn block_type(&self) -> BlockType {
        self.get::<BlockTypeAspect>()
    }

    pub fn set_block_type(&mut self, block: BlockType) {
        self.set::<BlockTypeAspect>(block);
    }

    fn differs<A: Aspect>(&self) -> bool {
        A::pending(&self.writes)
            .as_ref()
            .is_some_and(|value| value != self.read.get::<A>(self.location.block()))
    }

    /// Aspects whose buffered value differs from what was read.
    pub fn changed_aspects(&self) -> Vec<AspectKind> {
        let mut changed = Vec::new();
        if self.differs::<BlockTypeAspect>() {
            changed.push(AspectKind::BlockType);
        }
        if self.differs::<DamageAspect>() {
            changed.push(AspectKind::Damage);
        }
        if self.differs::<LightAspect>() {
            changed.push(AspectKind::Light);
        }
        if self.differs::<LogicAspect>() {
            changed.push(AspectKind::Logic);
        }
        if self.differs::<InventoryAspect>() {
            changed.push(AspectKind::Inventory);
        }
        changed
    }

    /// Whether the buffered state actually differs from what was read.
    pub fn did_change(&self) -> bool {
        !self.changed_aspects().is_empty()
    }

    /// Commit buffered writes into `target`. Returns whether anything changed.
    pub fn write_back(&self, target: &mut CuboidData) -> bool {
        fn apply<A: Aspect>(writes: &BlockWrites, target: &mut CuboidData, block: BlockAddress) -> bool {
            match A::pending(writes) {
                Some(value) => target.set::<A>(block, value.clone()),
                None => false,
            }
        }
        let block = self.location.block();
        let mut changed = apply::<BlockTypeAspect>(&self.writes, target, block);
        changed |= apply::<DamageAspect>(&self.writes, target, block);
        changed |= apply::<LightAspect>(&self.writes, target, block);
        changed |= apply::<LogicAspect>(&self.writes, target, block);
        changed |= apply::<InventoryAspect>(&self.writes, target, block);
        changed
    }
}
