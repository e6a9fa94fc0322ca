//! Cuboid aspect store: per-block aspect planes with copy-on-write versions and
//! resumable chunked encoding.
//!
//! # Invariants
//! - A published `CuboidData` is never mutated; writers clone and the clone
//!   copies a plane only when it first changes it.
//! - Writing a value equal to the current one is never a change.
//! - Encoding is canonical: equal content always yields equal bytes.

mod aspect;
mod codec;
mod cuboid;
mod error;
mod inventory;
mod mutable;
mod octree;
mod proxy;
mod value;

pub use aspect::{
    Aspect, AspectKind, BlockTypeAspect, DamageAspect, InventoryAspect, LightAspect, LogicAspect,
};
pub use codec::{CUBOID_HEADER_BYTES, DecodeProgress, DecodeResume, DecodeStage, EncodeResume};
pub use cuboid::CuboidData;
pub use error::CodecError;
pub use inventory::Inventory;
pub use mutable::{BlockChange, CuboidUpdate, MutableCuboid};
pub use octree::Octree;
pub use proxy::{BlockProxy, BlockWrites, MutableBlockProxy};
pub use value::PlaneValue;

/// Crate version, for tooling banners.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("cuboid"));
    }
}
