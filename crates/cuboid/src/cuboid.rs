use crate::aspect::{Aspect, AspectKind};
use crate::inventory::Inventory;
use crate::octree::Octree;
use crate::proxy::BlockProxy;
use cubeworld_common::{BlockAddress, BlockType, CuboidAddress};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One cuboid's block data: an independently stored octree plane per aspect.
///
/// Cloning is cheap: planes are shared behind `Arc` and only copied when a
/// clone writes to them, so a published cuboid stays valid for every reader
/// holding it while the next tick builds its successor.
#[derive(Debug, Clone, PartialEq)]
pub struct CuboidData {
    address: CuboidAddress,
    pub(crate) block_type: Arc<Octree<BlockType>>,
    pub(crate) damage: Arc<Octree<u16>>,
    pub(crate) light: Arc<Octree<u8>>,
    pub(crate) logic: Arc<Octree<u8>>,
    pub(crate) inventory: Arc<Octree<Option<Inventory>>>,
}

impl CuboidData {
    /// A cuboid entirely of `block`, with every other aspect at its empty baseline.
    pub fn filled(address: CuboidAddress, block: BlockType) -> Self {
        Self {
            address,
            block_type: Arc::new(Octree::filled(block)),
            damage: Arc::new(Octree::filled(0)),
            light: Arc::new(Octree::filled(0)),
            logic: Arc::new(Octree::filled(0)),
            inventory: Arc::new(Octree::filled(None)),
        }
    }

    pub fn address(&self) -> CuboidAddress {
        self.address
    }

    pub fn get<A: Aspect>(&self, block: BlockAddress) -> &A::Value {
        A::plane(self).get(block)
    }

    /// Write one aspect value. A write reproducing the current value is a
    /// no-op: it returns `false` and leaves shared planes shared.
    pub fn set<A: Aspect>(&mut self, block: BlockAddress, value: A::Value) -> bool {
        if *A::plane(self).get(block) == value {
            return false;
        }
        A::plane_mut(self).set(block, value)
    }

    pub fn block(&self, block: BlockAddress) -> BlockProxy<'_> {
        BlockProxy::new(self, block)
    }

    pub fn block_type(&self, block: BlockAddress) -> BlockType {
        *self.get::<crate::BlockTypeAspect>(block)
    }

    /// Whether two cuboids share the storage of a given plane.
    pub fn shares_plane(&self, other: &CuboidData, kind: AspectKind) -> bool {
        match kind {
            AspectKind::BlockType => Arc::ptr_eq(&self.block_type, &other.block_type),
            AspectKind::Damage => Arc::ptr_eq(&self.damage, &other.damage),
            AspectKind::Light => Arc::ptr_eq(&self.light, &other.light),
            AspectKind::Logic => Arc::ptr_eq(&self.logic, &other.logic),
            AspectKind::Inventory => Arc::ptr_eq(&self.inventory, &other.inventory),
        }
    }

    /// Every block where any aspect differs between the two cuboids.
    pub fn changed_blocks(&self, other: &CuboidData) -> BTreeSet<BlockAddress> {
        let mut out = Vec::new();
        for kind in AspectKind::ALL {
            if self.shares_plane(other, kind) {
                continue;
            }
            match kind {
                AspectKind::BlockType => self.block_type.diff_into(&other.block_type, &mut out),
                AspectKind::Damage => self.damage.diff_into(&other.damage, &mut out),
                AspectKind::Light => self.light.diff_into(&other.light, &mut out),
                AspectKind::Logic => self.logic.diff_into(&other.logic, &mut out),
                AspectKind::Inventory => self.inventory.diff_into(&other.inventory, &mut out),
            }
        }
        out.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockTypeAspect, DamageAspect, InventoryAspect, LightAspect, LogicAspect};
    use cubeworld_common::ItemType;

    fn cuboid() -> CuboidData {
        CuboidData::filled(CuboidAddress::new(0, 0, 0), BlockType::AIR)
    }

    #[test]
    fn clone_shares_until_written() {
        let original = cuboid();
        let mut copy = original.clone();
        assert!(copy.shares_plane(&original, AspectKind::BlockType));

        let block = BlockAddress::new(1, 1, 1);
        assert!(copy.set::<BlockTypeAspect>(block, BlockType::STONE));
        assert!(!copy.shares_plane(&original, AspectKind::BlockType));
        assert!(copy.shares_plane(&original, AspectKind::Damage));
        assert_eq!(original.block_type(block), BlockType::AIR);
        assert_eq!(copy.block_type(block), BlockType::STONE);
    }

    #[test]
    fn no_op_write_does_not_unshare() {
        let original = cuboid();
        let mut copy = original.clone();
        let block = BlockAddress::new(0, 0, 0);
        assert!(!copy.set::<BlockTypeAspect>(block, BlockType::AIR));
        assert!(!copy.set::<DamageAspect>(block, 0));
        assert!(!copy.set::<LightAspect>(block, 0));
        assert!(!copy.set::<LogicAspect>(block, 0));
        assert!(!copy.set::<InventoryAspect>(block, None));
        for kind in AspectKind::ALL {
            assert!(copy.shares_plane(&original, kind));
        }
    }

    #[test]
    fn changed_blocks_spans_aspects() {
        let original = cuboid();
        let mut copy = original.clone();
        copy.set::<LightAspect>(BlockAddress::new(2, 0, 0), 15);
        let mut inv = Inventory::with_capacity(4);
        inv.add(ItemType(1), 1);
        copy.set::<InventoryAspect>(BlockAddress::new(3, 0, 0), Some(inv));
        copy.set::<LogicAspect>(BlockAddress::new(2, 0, 0), 1);

        let changed: Vec<_> = original.changed_blocks(&copy).into_iter().collect();
        assert_eq!(
            changed,
            vec![BlockAddress::new(2, 0, 0), BlockAddress::new(3, 0, 0)]
        );
        assert!(original.changed_blocks(&original.clone()).is_empty());
    }
}
