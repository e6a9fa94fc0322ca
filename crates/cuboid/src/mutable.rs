use crate::aspect::{Aspect, AspectKind};
use crate::cuboid::CuboidData;
use crate::proxy::MutableBlockProxy;
use cubeworld_common::{AbsoluteLocation, BlockAddress, CuboidAddress};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One block's real change within a committed cuboid update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChange {
    pub block: BlockAddress,
    pub aspects: Vec<AspectKind>,
}

/// A published cuboid version together with the version it supersedes.
#[derive(Debug, Clone)]
pub struct CuboidUpdate {
    pub previous: Arc<CuboidData>,
    pub current: Arc<CuboidData>,
    pub changes: Vec<BlockChange>,
}

/// Tick-scoped writer for one cuboid.
///
/// Block proxies are created lazily on first touch and all bind to the same
/// read version, so later writes in the same tick see earlier ones.
#[derive(Debug)]
pub struct MutableCuboid {
    original: Arc<CuboidData>,
    proxies: BTreeMap<BlockAddress, MutableBlockProxy>,
}

impl MutableCuboid {
    pub fn new(original: Arc<CuboidData>) -> Self {
        Self {
            original,
            proxies: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> CuboidAddress {
        self.original.address()
    }

    pub fn original(&self) -> &Arc<CuboidData> {
        &self.original
    }

    /// The write proxy for `location`, which must lie in this cuboid.
    pub fn proxy(&mut self, location: AbsoluteLocation) -> &mut MutableBlockProxy {
        let original = &self.original;
        self.proxies
            .entry(location.block())
            .or_insert_with(|| MutableBlockProxy::new(location, original.clone()))
    }

    /// Read through any buffered write for the block.
    pub fn read<A: Aspect>(&self, block: BlockAddress) -> A::Value {
        match self.proxies.get(&block) {
            Some(proxy) => proxy.get::<A>(),
            None => self.original.get::<A>(block).clone(),
        }
    }

    /// Fold every proxy that really changed into a new version.
    ///
    /// Returns `None` when nothing changed; the original stays the current version.
    pub fn commit(self) -> Option<CuboidUpdate> {
        let mut next = (*self.original).clone();
        let mut changes = Vec::new();
        for (block, proxy) in &self.proxies {
            let aspects = proxy.changed_aspects();
            if aspects.is_empty() {
                continue;
            }
            proxy.write_back(&mut next);
            changes.push(BlockChange {
                block: *block,
                aspects,
            });
        }
        if changes.is_empty() {
            return None;
        }
        tracing::trace!(
            address = ?self.original.address(),
            blocks = changes.len(),
            "cuboid committed"
        );
        Some(CuboidUpdate {
            previous: self.original,
            current: Arc::new(next),
            changes,
        })
    }
}
