use crate::cuboid::CuboidData;
use crate::inventory::Inventory;
use crate::octree::Octree;
use crate::proxy::BlockWrites;
use crate::value::PlaneValue;
use cubeworld_common::BlockType;
use serde::{Deserialize, Serialize};

/// One named axis of per-block data. The discriminant is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AspectKind {
    BlockType = 0,
    Damage = 1,
    Light = 2,
    Logic = 3,
    Inventory = 4,
}

impl AspectKind {
    /// Every aspect, in encoding order.
    pub const ALL: [AspectKind; 5] = [
        AspectKind::BlockType,
        AspectKind::Damage,
        AspectKind::Light,
        AspectKind::Logic,
        AspectKind::Inventory,
    ];

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }
}

/// Static description of an aspect: its value type and where it lives in a
/// cuboid and in a pending block write.
pub trait Aspect: 'static {
    type Value: PlaneValue;
    const KIND: AspectKind;

    fn plane(cuboid: &CuboidData) -> &Octree<Self::Value>;
    /// Mutable plane access. Clones the plane first if it is shared.
    fn plane_mut(cuboid: &mut CuboidData) -> &mut Octree<Self::Value>;
    fn pending(writes: &BlockWrites) -> &Option<Self::Value>;
    fn pending_mut(writes: &mut BlockWrites) -> &mut Option<Self::Value>;
}

macro_rules! aspect {
    ($name:ident, $value:ty, $kind:ident, $field:ident) => {
        pub struct $name;

        impl Aspect for $name {
            type Value = $value;
            const KIND: AspectKind = AspectKind::$kind;

            fn plane(cuboid: &CuboidData) -> &Octree<$value> {
                &cuboid.$field
            }

            fn plane_mut(cuboid: &mut CuboidData) -> &mut Octree<$value> {
                std::sync::Arc::make_mut(&mut cuboid.$field)
            }

            fn pending(writes: &BlockWrites) -> &Option<$value> {
                &writes.$field
            }

            fn pending_mut(writes: &mut BlockWrites) -> &mut Option<$value> {
                &mut writes.$field
            }
        }
    };
}

aspect!(BlockTypeAspect, BlockType, BlockType, block_type);
aspect!(DamageAspect, u16, Damage, damage);
aspect!(LightAspect, u8, Light, light);
aspect!(LogicAspect, u8, Logic, logic);
aspect!(InventoryAspect, Option<Inventory>, Inventory, inventory);
