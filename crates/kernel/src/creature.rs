use crate::entity::{Creature, CreatureKind, CreatureSpawn};
use crate::reader::WorldReader;
use cubeworld_common::{AbsoluteLocation, CUBOID_EDGE, CuboidAddress, Vec3};
use cubeworld_cuboid::CuboidData;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a creature wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CreatureIntent {
    Idle,
    /// Walk along a horizontal unit direction at the creature's speed.
    Walk { direction: Vec3 },
    Despawn,
}

/// Creature decision making.
///
/// `random` is derived from the world seed, the tick, and the subject, so a
/// brain that only uses its arguments keeps the simulation deterministic.
pub trait CreatureBrain: Send + Sync {
    fn intent(&self, world: &dyn WorldReader, creature: &Creature, random: u64) -> CreatureIntent;

    /// Pick a creature to spawn this tick, if any.
    fn spawn(
        &self,
        cuboids: &BTreeMap<CuboidAddress, Arc<CuboidData>>,
        random: u64,
    ) -> Option<CreatureSpawn>;
}

/// Wanders in random axis directions and spawns on open ground.
#[derive(Debug, Clone, Copy, Default)]
pub struct WanderingBrain;

const DIRECTIONS: [Vec3; 4] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y];

impl CreatureBrain for WanderingBrain {
    fn intent(&self, _world: &dyn WorldReader, _creature: &Creature, random: u64) -> CreatureIntent {
        if random % 4 == 0 {
            CreatureIntent::Idle
        } else {
            CreatureIntent::Walk {
                direction: DIRECTIONS[((random >> 8) % 4) as usize],
            }
        }
    }

    fn spawn(
        &self,
        cuboids: &BTreeMap<CuboidAddress, Arc<CuboidData>>,
        random: u64,
    ) -> Option<CreatureSpawn> {
        // Roughly one attempt in sixteen ticks.
        if cuboids.is_empty() || (random >> 40) % 16 != 0 {
            return None;
        }
        let cuboid = cuboids.values().nth((random % cuboids.len() as u64) as usize)?;
        let base = cuboid.address().base();
        let x = ((random >> 16) % CUBOID_EDGE as u64) as i32;
        let y = ((random >> 24) % CUBOID_EDGE as u64) as i32;
        // Needs solid ground and two free blocks above it, all inside this cuboid.
        let ground = (0..CUBOID_EDGE - 2).rev().find(|z| {
            let at = |dz: i32| {
                cuboid.block_type(AbsoluteLocation::new(x, y, z + dz).block())
            };
            at(0).is_solid() && at(1).is_air() && at(2).is_air()
        })?;
        let kind = if (random >> 32) & 1 == 0 {
            CreatureKind::Cow
        } else {
            CreatureKind::Orc
        };
        Some(CreatureSpawn {
            kind,
            location: base.relative(x, y, ground + 1).floor_center(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::splitmix64;
    use cubeworld_common::{BlockType, EntityId};
    use cubeworld_cuboid::BlockTypeAspect;

    struct Nothing;

    impl WorldReader for Nothing {
        fn cuboid(&self, _address: CuboidAddress) -> Option<&CuboidData> {
            None
        }
    }

    #[test]
    fn intent_depends_only_on_random() {
        let creature = Creature::new(EntityId(-1), CreatureKind::Cow, Vec3::ZERO);
        for seed in 0..32 {
            let random = splitmix64(seed);
            assert_eq!(
                WanderingBrain.intent(&Nothing, &creature, random),
                WanderingBrain.intent(&Nothing, &creature, random)
            );
        }
    }

    #[test]
    fn spawns_on_ground() {
        let address = CuboidAddress::new(0, 0, 0);
        let mut cuboid = CuboidData::filled(address, BlockType::AIR);
        for x in 0..32 {
            for y in 0..32 {
                cuboid.set::<BlockTypeAspect>(
                    AbsoluteLocation::new(x, y, 3).block(),
                    BlockType::DIRT,
                );
            }
        }
        let cuboids = BTreeMap::from([(address, Arc::new(cuboid))]);
        let spawn = (0..1000)
            .find_map(|seed| WanderingBrain.spawn(&cuboids, splitmix64(seed)))
            .expect("some seed spawns");
        assert_eq!(spawn.location.z, 4.0);
    }

    #[test]
    fn no_ground_no_spawn() {
        let address = CuboidAddress::new(0, 0, 0);
        let cuboids = BTreeMap::from([(
            address,
            Arc::new(CuboidData::filled(address, BlockType::AIR)),
        )]);
        for seed in 0..200 {
            assert_eq!(WanderingBrain.spawn(&cuboids, splitmix64(seed)), None);
            assert_eq!(WanderingBrain.spawn(&BTreeMap::new(), splitmix64(seed)), None);
        }
    }
}
