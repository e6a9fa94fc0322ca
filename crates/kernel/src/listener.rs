use crate::entity::{Entity, RecordUpdate};
use crate::event::EventRecord;
use crate::snapshot::WorldSnapshot;
use cubeworld_common::{CuboidAddress, EntityId};
use cubeworld_cuboid::{CuboidData, CuboidUpdate};
use std::sync::Arc;

/// Observer of published ticks, called on the thread that ran the postamble.
///
/// Every method defaults to doing nothing.
pub trait TickListener: Send + Sync {
    fn cuboid_loaded(&self, _cuboid: &Arc<CuboidData>) {}
    fn cuboid_changed(&self, _update: &CuboidUpdate) {}
    fn cuboid_unloaded(&self, _address: CuboidAddress) {}
    fn entity_loaded(&self, _entity: &Arc<Entity>) {}
    fn entity_changed(&self, _update: &RecordUpdate<Entity>) {}
    fn entity_unloaded(&self, _id: EntityId) {}
    fn event_posted(&self, _event: &EventRecord) {}
    fn tick_completed(&self, _snapshot: &WorldSnapshot) {}
}

pub struct NoopListener;

impl TickListener for NoopListener {}

/// Fan a published snapshot out to `listener`.
pub(crate) fn notify(listener: &dyn TickListener, snapshot: &WorldSnapshot) {
    let changes = &snapshot.changes;
    for address in &changes.loaded_cuboids {
        if let Some(cuboid) = snapshot.state.cuboids.get(address) {
            listener.cuboid_loaded(cuboid);
        }
    }
    for update in changes.cuboid_updates.values() {
        listener.cuboid_changed(update);
    }
    for address in &changes.unloaded_cuboids {
        listener.cuboid_unloaded(*address);
    }
    for id in &changes.loaded_entities {
        if let Some(entity) = snapshot.state.entities.get(id) {
            listener.entity_loaded(entity);
        }
    }
    for update in changes.entity_updates.values() {
        listener.entity_changed(update);
    }
    for id in &changes.unloaded_entities {
        listener.entity_unloaded(*id);
    }
    for event in &snapshot.events {
        listener.event_posted(event);
    }
    listener.tick_completed(snapshot);
}
