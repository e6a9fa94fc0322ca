use crate::projection::{Issued, SpeculativeProjection};
use crate::update::TickUpdate;
use cubeworld_common::{AbsoluteLocation, CommitLevel};
use cubeworld_kernel::EntityAction;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Tick updates received off the network thread, waiting for the client
/// thread to fold them in.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    updates: Mutex<VecDeque<TickUpdate>>,
}

impl InboundBuffer {
    pub fn push(&self, update: TickUpdate) {
        self.updates.lock().push_back(update);
    }

    pub fn drain(&self) -> Vec<TickUpdate> {
        self.updates.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }
}

/// Drives a projection from one thread: local input goes in, actions to send
/// come out, and buffered server updates are applied in arrival order.
pub struct ClientRunner {
    projection: SpeculativeProjection,
    inbound: Arc<InboundBuffer>,
    outbound: Vec<Issued>,
}

impl ClientRunner {
    pub fn new(projection: SpeculativeProjection) -> Self {
        Self {
            projection,
            inbound: Arc::new(InboundBuffer::default()),
            outbound: Vec::new(),
        }
    }

    /// Handle for the thread receiving server updates.
    pub fn inbound(&self) -> Arc<InboundBuffer> {
        self.inbound.clone()
    }

    pub fn projection(&self) -> &SpeculativeProjection {
        &self.projection
    }

    pub fn submit(&mut self, action: EntityAction, now_millis: u64) -> Option<CommitLevel> {
        let commit_level = self.projection.apply_local_action(action.clone(), now_millis)?;
        self.outbound.push(Issued {
            action,
            commit_level,
        });
        Some(commit_level)
    }

    pub fn begin_break(&mut self, target: AbsoluteLocation, now_millis: u64) {
        let issued = self.projection.begin_break(target, now_millis);
        self.outbound.extend(issued);
    }

    pub fn cancel_activity(&mut self, now_millis: u64) {
        self.outbound.extend(self.projection.cancel_activity(now_millis));
    }

    /// Advance local activity and fold in every buffered server update.
    /// Returns the number of local actions still unconfirmed.
    pub fn run_pending(&mut self, now_millis: u64) -> usize {
        let mut remaining = self.projection.pending_count();
        for update in self.inbound.drain() {
            remaining = self.projection.apply_authoritative_tick(&update, now_millis);
        }
        self.outbound
            .extend(self.projection.advance_activity(now_millis));
        remaining
    }

    /// Actions to send, in commit order.
    pub fn take_outbound(&mut self) -> Vec<Issued> {
        std::mem::take(&mut self.outbound)
    }
}
