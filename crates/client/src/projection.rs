use crate::listener::ProjectionListener;
use crate::update::TickUpdate;
use crate::world::ClientWorld;
use cubeworld_common::{AbsoluteLocation, CommitLevel, EntityId};
use cubeworld_kernel::{BlockMutation, EntityAction, Physics, SimplePhysics, WorldReader};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info_span, trace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub millis_per_tick: u64,
    /// Minimum time between two `Break` increments of a local activity.
    pub break_millis_per_increment: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            millis_per_tick: 50,
            break_millis_per_increment: 100,
        }
    }
}

/// A local action the server has not yet confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeculativeEntry {
    pub action: EntityAction,
    pub commit_level: CommitLevel,
    /// Follow-up mutations produced the last time the action was projected.
    pub follow_ups: Vec<BlockMutation>,
    /// Whether the action applied in the current projection.
    pub applied: bool,
    pub submitted_millis: u64,
}

/// Follow-ups of an action the server applied in tick `lands_in_tick - 1`;
/// they are still queued server-side and become authoritative in
/// `lands_in_tick`.
#[derive(Debug, Clone, PartialEq)]
struct ShearedFollowUp {
    mutations: Vec<BlockMutation>,
    lands_in_tick: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LocalActivity {
    target: AbsoluteLocation,
    last_millis: u64,
}

/// An action the projection issued that must be sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Issued {
    pub action: EntityAction,
    pub commit_level: CommitLevel,
}

/// Client-side world prediction.
///
/// Holds the last authoritative view (the shadow) and the view presented to
/// the player (the projection): the shadow, plus follow-ups the server has
/// committed to but not applied, plus every unconfirmed local action replayed
/// in order. Reconciliation rebuilds the projection from scratch, so an
/// action that stops applying simply drops out of it.
pub struct SpeculativeProjection {
    local: EntityId,
    config: ProjectionConfig,
    physics: Arc<dyn Physics>,
    shadow: ClientWorld,
    projected: ClientWorld,
    speculative: VecDeque<SpeculativeEntry>,
    sheared: Vec<ShearedFollowUp>,
    next_commit: CommitLevel,
    last_tick: u64,
    activity: Option<LocalActivity>,
    listener: Box<dyn ProjectionListener>,
}

impl SpeculativeProjection {
    pub fn new(
        local: EntityId,
        config: ProjectionConfig,
        listener: Box<dyn ProjectionListener>,
    ) -> Self {
        Self::with_physics(local, config, listener, Arc::new(SimplePhysics::default()))
    }

    pub fn with_physics(
        local: EntityId,
        config: ProjectionConfig,
        listener: Box<dyn ProjectionListener>,
        physics: Arc<dyn Physics>,
    ) -> Self {
        Self {
            local,
            config,
            physics,
            shadow: ClientWorld::default(),
            projected: ClientWorld::default(),
            speculative: VecDeque::new(),
            sheared: Vec::new(),
            next_commit: CommitLevel::NONE,
            last_tick: 0,
            activity: None,
            listener,
        }
    }

    pub fn local(&self) -> EntityId {
        self.local
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// The world as last confirmed by the server.
    pub fn shadow(&self) -> &ClientWorld {
        &self.shadow
    }

    /// The world as the player should see it.
    pub fn projected(&self) -> &ClientWorld {
        &self.projected
    }

    pub fn pending(&self) -> impl Iterator<Item = &SpeculativeEntry> {
        self.speculative.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.speculative.len()
    }

    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    /// Target of the local break activity, if one is running.
    pub fn activity_target(&self) -> Option<AbsoluteLocation> {
        self.activity.map(|activity| activity.target)
    }

    /// Apply `action` locally. Returns the commit level to send it with, or
    /// `None` if it does not apply to the projected world, in which case
    /// nothing changes and nothing should be sent.
    pub fn apply_local_action(&mut self, action: EntityAction, now_millis: u64) -> Option<CommitLevel> {
        let mut next = self.projected.clone();
        let follow_ups = match next.speculate(self.local, &action, self.physics.as_ref()) {
            Ok(follow_ups) => follow_ups,
            Err(error) => {
                debug!(?action, %error, "local action rejected");
                return None;
            }
        };
        let commit_level = self.next_commit.next();
        self.next_commit = commit_level;
        trace!(%commit_level, ?action, "speculating");
        self.speculative.push_back(SpeculativeEntry {
            action,
            commit_level,
            follow_ups,
            applied: true,
            submitted_millis: now_millis,
        });
        let previous = std::mem::replace(&mut self.projected, next);
        self.announce(&previous);
        Some(commit_level)
    }

    /// Fold one authoritative tick into the shadow and rebuild the
    /// projection. Returns how many local actions remain unconfirmed.
    pub fn apply_authoritative_tick(&mut self, update: &TickUpdate, now_millis: u64) -> usize {
        let _span = info_span!("reconcile", tick = update.tick).entered();
        let before = self.shadow.clone();

        for address in &update.unloaded_cuboids {
            self.shadow.cuboids.remove(address);
        }
        for id in &update.unloaded_entities {
            self.shadow.entities.remove(id);
        }
        for mutation in &update.committed_mutations {
            if let Err(error) = self.shadow.apply_mutation(mutation) {
                debug!(?mutation, %error, "committed mutation not applied to shadow");
            }
        }
        for cuboid in &update.new_cuboids {
            self.shadow.cuboids.insert(cuboid.address(), cuboid.clone());
        }
        for entity in &update.entities {
            self.shadow.entities.insert(entity.id, entity.clone());
        }
        for id in &update.despawned_creatures {
            self.shadow.creatures.remove(id);
        }
        for creature in &update.creatures {
            self.shadow.creatures.insert(creature.id, creature.clone());
        }
        for id in &update.despawned_passives {
            self.shadow.passives.remove(id);
        }
        for passive in &update.passives {
            self.shadow.passives.insert(passive.id, passive.clone());
        }

        while let Some(entry) = self.speculative.front() {
            if entry.commit_level > update.confirmed_commit_level {
                break;
            }
            trace!(
                commit_level = %entry.commit_level,
                round_trip_millis = now_millis.saturating_sub(entry.submitted_millis),
                "confirmed"
            );
            self.speculative.pop_front();
        }

        // Actions echoed this tick queued follow-ups that only land next
        // tick. Recreate them against the state the server saw.
        self.sheared.retain(|sheared| sheared.lands_in_tick > update.tick);
        if let Some(echoed) = update.committed_actions.get(&self.local) {
            let mut scratch = before;
            for committed in echoed {
                match scratch.apply_action(self.local, &committed.action, self.physics.as_ref()) {
                    Ok(mutations) if !mutations.is_empty() => self.sheared.push(ShearedFollowUp {
                        mutations,
                        lands_in_tick: update.tick + 1,
                    }),
                    Ok(_) => {}
                    Err(error) => debug!(action = ?committed.action, %error, "echoed action did not replay"),
                }
            }
        }

        let mut projected = self.shadow.clone();
        for sheared in &self.sheared {
            projected.apply_follow_ups(&sheared.mutations);
        }
        for entry in &mut self.speculative {
            match projected.speculate(self.local, &entry.action, self.physics.as_ref()) {
                Ok(follow_ups) => {
                    entry.follow_ups = follow_ups;
                    entry.applied = true;
                }
                Err(error) => {
                    debug!(commit_level = %entry.commit_level, %error, "speculative action no longer applies");
                    entry.follow_ups.clear();
                    entry.applied = false;
                }
            }
        }

        self.last_tick = update.tick;
        let previous = std::mem::replace(&mut self.projected, projected);
        self.announce(&previous);
        for event in &update.events {
            self.listener.event_posted(event);
        }
        self.listener.tick_completed(update.tick);
        self.speculative.len()
    }

    /// Start breaking `target`. A break already running on another block is
    /// cancelled first, since the server refuses a second one.
    pub fn begin_break(&mut self, target: AbsoluteLocation, now_millis: u64) -> Vec<Issued> {
        let mut issued = Vec::new();
        let ongoing = self
            .projected
            .entities
            .get(&self.local)
            .and_then(|entity| entity.ongoing_break);
        if matches!(ongoing, Some(current) if current != target) {
            issued.extend(self.issue(EntityAction::CancelActivity, now_millis));
        }
        self.activity = Some(LocalActivity {
            target,
            last_millis: now_millis,
        });
        issued
    }

    /// Advance the local break activity. Issues a `Break` carrying the time
    /// spent since the last increment, once enough time has passed. The
    /// activity ends when its block is gone or the break is refused.
    pub fn advance_activity(&mut self, now_millis: u64) -> Option<Issued> {
        let activity = self.activity?;
        let elapsed = now_millis.saturating_sub(activity.last_millis);
        if elapsed < self.config.break_millis_per_increment {
            return None;
        }
        if self
            .projected
            .block_type_at(activity.target)
            .is_none_or(|block| block.is_air())
        {
            self.activity = None;
            return None;
        }
        let action = EntityAction::Break {
            target: activity.target,
            millis: elapsed.min(u64::from(u16::MAX)) as u16,
        };
        match self.issue(action, now_millis) {
            Some(issued) => {
                self.activity = Some(LocalActivity {
                    last_millis: now_millis,
                    ..activity
                });
                Some(issued)
            }
            None => {
                self.activity = None;
                None
            }
        }
    }

    /// Stop the local activity. Issues a `CancelActivity` if the projected
    /// entity still has a break recorded.
    pub fn cancel_activity(&mut self, now_millis: u64) -> Option<Issued> {
        self.activity = None;
        let ongoing = self
            .projected
            .entities
            .get(&self.local)
            .and_then(|entity| entity.ongoing_break);
        ongoing.and_then(|_| self.issue(EntityAction::CancelActivity, now_millis))
    }

    fn issue(&mut self, action: EntityAction, now_millis: u64) -> Option<Issued> {
        self.apply_local_action(action.clone(), now_millis)
            .map(|commit_level| Issued {
                action,
                commit_level,
            })
    }

    /// Fire listener callbacks for the differences between `previous` and
    /// the current projection.
    fn announce(&mut self, previous: &ClientWorld) {
        let listener = self.listener.as_mut();
        for (address, cuboid) in &self.projected.cuboids {
            match previous.cuboids.get(address) {
                None => listener.cuboid_loaded(cuboid),
                Some(old) if !Arc::ptr_eq(old, cuboid) => {
                    let blocks = old.changed_blocks(cuboid);
                    if !blocks.is_empty() {
                        listener.cuboid_changed(cuboid, &blocks);
                    }
                }
                Some(_) => {}
            }
        }
        for address in previous.cuboids.keys() {
            if !self.projected.cuboids.contains_key(address) {
                listener.cuboid_unloaded(*address);
            }
        }
        for change in diff(&previous.entities, &self.projected.entities) {
            match change {
                Change::Loaded(entity) => listener.entity_loaded(entity),
                Change::Changed(old, entity) => listener.entity_changed(old, entity),
                Change::Unloaded(id) => listener.entity_unloaded(id),
            }
        }
        for change in diff(&previous.creatures, &self.projected.creatures) {
            match change {
                Change::Loaded(creature) => listener.creature_loaded(creature),
                Change::Changed(old, creature) => listener.creature_changed(old, creature),
                Change::Unloaded(id) => listener.creature_unloaded(id),
            }
        }
        for change in diff(&previous.passives, &self.projected.passives) {
            match change {
                Change::Loaded(passive) => listener.passive_loaded(passive),
                Change::Changed(old, passive) => listener.passive_changed(old, passive),
                Change::Unloaded(id) => listener.passive_unloaded(id),
            }
        }
    }
}

enum Change<'a, K, V> {
    Loaded(&'a Arc<V>),
    Changed(&'a Arc<V>, &'a Arc<V>),
    Unloaded(K),
}

/// Record-level differences between two maps, compared by value.
fn diff<'a, K: Ord + Copy, V: PartialEq>(
    previous: &'a BTreeMap<K, Arc<V>>,
    current: &'a BTreeMap<K, Arc<V>>,
) -> Vec<Change<'a, K, V>> {
    let mut changes: Vec<Change<'a, K, V>> = current
        .iter()
        .filter_map(|(id, record)| match previous.get(id) {
            None => Some(Change::Loaded(record)),
            Some(old) if **old != **record => Some(Change::Changed(old, record)),
            Some(_) => None,
        })
        .collect();
    changes.extend(
        previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .map(|id| Change::Unloaded(*id)),
    );
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{CountingListener, NullProjectionListener};
    use cubeworld_common::{BlockType, CuboidAddress, ItemType, PassiveId, Vec3};
    use cubeworld_cuboid::{BlockTypeAspect, CuboidData};
    use cubeworld_kernel::{CommittedAction, Creature, CreatureKind, Entity, Passive, PassiveKind};

    const PLAYER: EntityId = EntityId(1);

    fn ground() -> Arc<CuboidData> {
        let address = CuboidAddress::new(0, 0, 0);
        let mut cuboid = CuboidData::filled(address, BlockType::AIR);
        for x in 0..32 {
            for y in 0..32 {
                cuboid.set::<BlockTypeAspect>(AbsoluteLocation::new(x, y, 0).block(), BlockType::STONE);
            }
        }
        Arc::new(cuboid)
    }

    fn player(stone: u32) -> Arc<Entity> {
        Arc::new(Entity::new(PLAYER, Vec3::new(4.5, 4.5, 1.0)).with_items(ItemType(1), stone))
    }

    fn first_update() -> TickUpdate {
        TickUpdate {
            tick: 1,
            new_cuboids: vec![ground()],
            entities: vec![player(2)],
            ..TickUpdate::default()
        }
    }

    fn projection() -> SpeculativeProjection {
        let mut projection =
            SpeculativeProjection::new(PLAYER, ProjectionConfig::default(), Box::new(NullProjectionListener));
        projection.apply_authoritative_tick(&first_update(), 0);
        projection
    }

    fn place(x: i32) -> EntityAction {
        EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(x, 4, 1),
            block: BlockType::STONE,
        }
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: ProjectionConfig = serde_json::from_str(r#"{"millis_per_tick": 20}"#).unwrap();
        assert_eq!(config.millis_per_tick, 20);
        assert_eq!(config.break_millis_per_increment, 100);
    }

    #[test]
    fn local_action_projects_immediately() {
        let mut projection = projection();
        assert_eq!(projection.apply_local_action(place(6), 10), Some(CommitLevel(1)));
        assert_eq!(
            projection.projected().block_type_at(AbsoluteLocation::new(6, 4, 1)),
            Some(BlockType::STONE)
        );
        assert_eq!(
            projection.shadow().block_type_at(AbsoluteLocation::new(6, 4, 1)),
            Some(BlockType::AIR)
        );
        assert_eq!(projection.pending_count(), 1);
    }

    #[test]
    fn rejected_action_is_not_numbered() {
        let mut projection = projection();
        let far = EntityAction::PlaceBlock {
            target: AbsoluteLocation::new(20, 4, 1),
            block: BlockType::STONE,
        };
        assert_eq!(projection.apply_local_action(far, 0), None);
        assert_eq!(projection.apply_local_action(place(6), 0), Some(CommitLevel(1)));
    }

    #[test]
    fn confirmation_retires_entries_and_keeps_follow_ups_until_they_land() {
        let mut projection = projection();
        projection.apply_local_action(place(6), 0);
        let after_action = Entity {
            inventory: player(1).inventory.clone(),
            ..Entity::clone(&player(2))
        };
        let confirm = TickUpdate {
            tick: 2,
            entities: vec![Arc::new(after_action)],
            committed_actions: [(
                PLAYER,
                vec![CommittedAction {
                    action: place(6),
                    commit_level: CommitLevel(1),
                }],
            )]
            .into_iter()
            .collect(),
            confirmed_commit_level: CommitLevel(1),
            ..TickUpdate::default()
        };
        assert_eq!(projection.apply_authoritative_tick(&confirm, 50), 0);
        // Not yet in the shadow, still shown.
        let target = AbsoluteLocation::new(6, 4, 1);
        assert_eq!(projection.shadow().block_type_at(target), Some(BlockType::AIR));
        assert_eq!(projection.projected().block_type_at(target), Some(BlockType::STONE));

        let landed = TickUpdate {
            tick: 3,
            committed_mutations: vec![BlockMutation::ReplaceBlock {
                location: target,
                expected: BlockType::AIR,
                replacement: BlockType::STONE,
            }],
            confirmed_commit_level: CommitLevel(1),
            ..TickUpdate::default()
        };
        projection.apply_authoritative_tick(&landed, 100);
        assert_eq!(projection.shadow().block_type_at(target), Some(BlockType::STONE));
        assert!(projection.sheared.is_empty());
    }

    #[test]
    fn actions_that_stop_applying_are_kept_but_hidden() {
        let mut projection = projection();
        projection.apply_local_action(place(6), 0);
        // The server hands out the player's stone elsewhere before the action arrives.
        let empty = TickUpdate {
            tick: 2,
            entities: vec![player(0)],
            ..TickUpdate::default()
        };
        assert_eq!(projection.apply_authoritative_tick(&empty, 50), 1);
        let entry = projection.pending().next().unwrap();
        assert!(!entry.applied);
        assert_eq!(
            projection.projected().block_type_at(AbsoluteLocation::new(6, 4, 1)),
            Some(BlockType::AIR)
        );
    }

    #[test]
    fn breaking_issues_increments_and_stops_at_air() {
        let mut projection = projection();
        let target = AbsoluteLocation::new(5, 4, 0);
        assert!(projection.begin_break(target, 0).is_empty());
        assert!(projection.advance_activity(50).is_none());

        let first = projection.advance_activity(800).unwrap();
        assert_eq!(first.action, EntityAction::Break { target, millis: 800 });
        assert_eq!(projection.activity_target(), Some(target));

        // Stone breaks at 1500 accumulated damage.
        projection.advance_activity(1600).unwrap();
        assert_eq!(projection.projected().block_type_at(target), Some(BlockType::AIR));
        assert!(projection.advance_activity(2000).is_none());
        assert_eq!(projection.activity_target(), None);
    }

    #[test]
    fn switching_targets_cancels_the_old_break() {
        let mut projection = projection();
        let first = AbsoluteLocation::new(5, 4, 0);
        projection.begin_break(first, 0);
        projection.advance_activity(200).unwrap();

        let issued = projection.begin_break(AbsoluteLocation::new(3, 4, 0), 300);
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].action, EntityAction::CancelActivity);
        assert!(projection.advance_activity(500).is_some());
    }

    #[test]
    fn listener_sees_projected_changes() {
        let listener = CountingListener::default();
        let counters = listener.counters.clone();
        let mut projection =
            SpeculativeProjection::new(PLAYER, ProjectionConfig::default(), Box::new(listener));
        projection.apply_authoritative_tick(&first_update(), 0);
        projection.apply_local_action(place(6), 0);

        let counters = counters.lock();
        assert_eq!(counters.cuboids_loaded, 1);
        assert_eq!(counters.entities_loaded, 1);
        assert_eq!(counters.blocks_changed, 1);
        assert_eq!(counters.entities_changed, 1);
        assert_eq!(counters.ticks, 1);
    }

    #[test]
    fn creatures_and_passives_reach_the_listener() {
        let listener = CountingListener::default();
        let counters = listener.counters.clone();
        let mut projection =
            SpeculativeProjection::new(PLAYER, ProjectionConfig::default(), Box::new(listener));
        projection.apply_authoritative_tick(&first_update(), 0);

        let cow = Arc::new(Creature::new(EntityId(-1), CreatureKind::Cow, Vec3::new(8.5, 8.5, 1.0)));
        let item = Arc::new(Passive {
            id: PassiveId(1),
            kind: PassiveKind::ItemStack {
                item: ItemType(1),
                count: 1,
            },
            location: Vec3::new(6.5, 6.5, 3.0),
            velocity: Vec3::ZERO,
            spawned_tick: 1,
        });
        let spawned = TickUpdate {
            tick: 2,
            creatures: vec![cow.clone()],
            passives: vec![item.clone()],
            ..TickUpdate::default()
        };
        projection.apply_authoritative_tick(&spawned, 50);
        assert_eq!(projection.projected().creatures[&EntityId(-1)], cow);

        let walked = Arc::new(Creature {
            location: Vec3::new(9.5, 8.5, 1.0),
            ..Creature::clone(&cow)
        });
        let later = TickUpdate {
            tick: 3,
            creatures: vec![walked],
            despawned_passives: vec![PassiveId(1)],
            ..TickUpdate::default()
        };
        projection.apply_authoritative_tick(&later, 100);
        assert!(projection.projected().passives.is_empty());

        // A resent but identical record is not a change.
        let same = TickUpdate {
            tick: 4,
            creatures: vec![Arc::new(Creature::clone(&projection.shadow().creatures[&EntityId(-1)]))],
            ..TickUpdate::default()
        };
        projection.apply_authoritative_tick(&same, 150);

        let counters = counters.lock();
        assert_eq!(counters.creatures_loaded, 1);
        assert_eq!(counters.creatures_changed, 1);
        assert_eq!(counters.passives_loaded, 1);
        assert_eq!(counters.passives_unloaded, 1);
        assert_eq!(counters.passives_changed, 0);
    }
}
