use cubeworld_common::ItemType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded bag of items, used both as a block aspect (chests, dropped
/// stacks stored in a block) and as entity inventory.
///
/// Capacity bounds the total item count. Item entries with a zero count are
/// never stored, so two inventories holding the same items always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    capacity: u32,
    items: BTreeMap<ItemType, u32>,
}

impl Inventory {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            capacity,
            items: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn count(&self, item: ItemType) -> u32 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &BTreeMap<ItemType, u32> {
        &self.items
    }

    /// Add up to `count` items, limited by free capacity. Returns how many fit.
    pub fn add(&mut self, item: ItemType, count: u32) -> u32 {
        let accepted = count.min(self.capacity.saturating_sub(self.total()));
        if accepted > 0 {
            *self.items.entry(item).or_insert(0) += accepted;
        }
        accepted
    }

    /// Remove exactly `count` items. Fails without change if fewer are held.
    pub fn remove(&mut self, item: ItemType, count: u32) -> bool {
        let held = self.count(item);
        if held < count {
            return false;
        }
        if held == count {
            self.items.remove(&item);
        } else {
            self.items.insert(item, held - count);
        }
        true
    }
}
