use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Edge length of a cuboid, in blocks.
pub const CUBOID_EDGE: i32 = 32;
/// Number of blocks in one cuboid.
pub const BLOCKS_PER_CUBOID: usize = (CUBOID_EDGE * CUBOID_EDGE * CUBOID_EDGE) as usize;

/// Address of a cuboid in cuboid units. `z` is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CuboidAddress {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl CuboidAddress {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// The vertical column this cuboid belongs to.
    pub fn column(self) -> ColumnAddress {
        ColumnAddress::new(self.x, self.y)
    }

    /// Absolute location of this cuboid's (0,0,0) block.
    pub fn base(self) -> AbsoluteLocation {
        AbsoluteLocation::new(
            i32::from(self.x) * CUBOID_EDGE,
            i32::from(self.y) * CUBOID_EDGE,
            i32::from(self.z) * CUBOID_EDGE,
        )
    }

    pub fn offset(self, dx: i16, dy: i16, dz: i16) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A vertical stack of cuboids sharing (x, y). The unit of parallel scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnAddress {
    pub x: i16,
    pub y: i16,
}

impl ColumnAddress {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// Block offset within a cuboid. Each component is in `0..CUBOID_EDGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockAddress {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl BlockAddress {
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            i32::from(x) < CUBOID_EDGE && i32::from(y) < CUBOID_EDGE && i32::from(z) < CUBOID_EDGE,
            "block address ({x}, {y}, {z}) out of range"
        );
        Self { x, y, z }
    }

    /// Linear index in x-major order.
    pub fn index(self) -> usize {
        let edge = CUBOID_EDGE as usize;
        (usize::from(self.z) * edge + usize::from(self.y)) * edge + usize::from(self.x)
    }

    pub fn from_index(index: usize) -> Self {
        assert!(index < BLOCKS_PER_CUBOID, "block index {index} out of range");
        let edge = CUBOID_EDGE as usize;
        Self {
            x: (index % edge) as u8,
            y: ((index / edge) % edge) as u8,
            z: (index / (edge * edge)) as u8,
        }
    }
}

/// World-space block location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AbsoluteLocation {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl AbsoluteLocation {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block containing a world-space point.
    pub fn containing(point: Vec3) -> Self {
        Self::new(
            point.x.floor() as i32,
            point.y.floor() as i32,
            point.z.floor() as i32,
        )
    }

    pub fn cuboid(self) -> CuboidAddress {
        CuboidAddress::new(
            self.x.div_euclid(CUBOID_EDGE) as i16,
            self.y.div_euclid(CUBOID_EDGE) as i16,
            self.z.div_euclid(CUBOID_EDGE) as i16,
        )
    }

    pub fn block(self) -> BlockAddress {
        BlockAddress {
            x: self.x.rem_euclid(CUBOID_EDGE) as u8,
            y: self.y.rem_euclid(CUBOID_EDGE) as u8,
            z: self.z.rem_euclid(CUBOID_EDGE) as u8,
        }
    }

    pub fn relative(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Point at the bottom-center of this block, where standing entities rest.
    pub fn floor_center(self) -> Vec3 {
        Vec3::new(self.x as f32 + 0.5, self.y as f32 + 0.5, self.z as f32)
    }

    /// Squared distance from a world-space point to this block's center.
    pub fn distance_squared_to(self, point: Vec3) -> f32 {
        let center = Vec3::new(self.x as f32 + 0.5, self.y as f32 + 0.5, self.z as f32 + 0.5);
        center.distance_squared(point)
    }
}
