use serde::{Deserialize, Serialize};

/// Tick coordinator configuration.
///
/// Every field has a default, so a config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Worker threads in the pool. Zero is treated as one.
    pub worker_threads: usize,
    /// Simulated time one tick covers; delays count down by this much per tick.
    pub millis_per_tick: u64,
    /// Inbound actions an entity may have waiting before it is disconnected.
    pub max_pending_actions_per_entity: usize,
    /// Seed mixed into all per-tick randomness.
    pub world_seed: u64,
    /// The spawn unit does nothing once this many creatures exist.
    pub max_creatures: usize,
    /// Item stacks lying in the world despawn after this many ticks.
    pub passive_lifetime_ticks: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            millis_per_tick: 50,
            max_pending_actions_per_entity: 10,
            world_seed: 0,
            max_creatures: 32,
            passive_lifetime_ticks: 600,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_threads.max(1)
    }
}
