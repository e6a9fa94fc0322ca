//! Shared identifiers and coordinates for the cubeworld simulation.
//!
//! # Invariants
//! - Player ids are positive, creature ids negative; passives have their own space.
//! - `z` is the vertical axis; a column is every cuboid sharing (x, y).

mod address;
mod types;

pub use address::{
    AbsoluteLocation, BLOCKS_PER_CUBOID, BlockAddress, CUBOID_EDGE, ColumnAddress, CuboidAddress,
};
pub use glam::Vec3;
pub use types::{BlockType, CommitLevel, EntityId, ItemType, PassiveId};

/// Crate version, for tooling banners.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
