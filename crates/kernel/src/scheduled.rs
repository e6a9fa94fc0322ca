use crate::action::EntityAction;
use crate::mutation::BlockMutation;
use cubeworld_common::CommitLevel;
use serde::{Deserialize, Serialize};

/// A mutation waiting in its cuboid's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledMutation {
    pub mutation: BlockMutation,
    /// Remaining delay. Applied in the first tick that starts with this at zero.
    pub delay_millis: u64,
}

/// An action waiting in its entity's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub action: EntityAction,
    /// Client sequence number; `CommitLevel::NONE` for server-originated actions.
    pub commit_level: CommitLevel,
    pub delay_millis: u64,
}

/// An action that applied successfully, echoed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedAction {
    pub action: EntityAction,
    pub commit_level: CommitLevel,
}

pub trait Delayed {
    fn delay_millis(&self) -> u64;
    fn set_delay_millis(&mut self, delay: u64);
}

impl Delayed for ScheduledMutation {
    fn delay_millis(&self) -> u64 {
        self.delay_millis
    }

    fn set_delay_millis(&mut self, delay: u64) {
        self.delay_millis = delay;
    }
}

impl Delayed for ScheduledAction {
    fn delay_millis(&self) -> u64 {
        self.delay_millis
    }

    fn set_delay_millis(&mut self, delay: u64) {
        self.delay_millis = delay;
    }
}

/// Split an entity's queue for this tick.
///
/// Items apply in FIFO order; the first one still delayed holds back itself
/// and everything queued after it. Carried items count down by one tick.
pub fn split_blocking<T: Delayed + Clone>(queue: &[T], millis_per_tick: u64) -> (Vec<T>, Vec<T>) {
    let ready_len = queue
        .iter()
        .position(|item| item.delay_millis() > 0)
        .unwrap_or(queue.len());
    let ready = queue[..ready_len].to_vec();
    let carried = queue[ready_len..]
        .iter()
        .map(|item| count_down(item, millis_per_tick))
        .collect();
    (ready, carried)
}

/// Split a cuboid's queue for this tick.
///
/// Delayed mutations do not hold back ready ones, but both halves keep their
/// submission order.
pub fn split_independent<T: Delayed + Clone>(
    queue: &[T],
    millis_per_tick: u64,
) -> (Vec<T>, Vec<T>) {
    let mut ready = Vec::new();
    let mut carried = Vec::new();
    for item in queue {
        if item.delay_millis() == 0 {
            ready.push(item.clone());
        } else {
            carried.push(count_down(item, millis_per_tick));
        }
    }
    (ready, carried)
}

fn count_down<T: Delayed + Clone>(item: &T, millis_per_tick: u64) -> T {
    let mut item = item.clone();
    item.set_delay_millis(item.delay_millis().saturating_sub(millis_per_tick));
    item
}
