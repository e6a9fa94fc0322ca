use crate::reader::WorldReader;
use cubeworld_common::{AbsoluteLocation, Vec3};

/// Location and velocity of anything physics moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub location: Vec3,
    pub velocity: Vec3,
}

/// Movement resolution. Pluggable so tests and alternative rule sets can
/// swap it, but it must be a pure function of its arguments.
pub trait Physics: Send + Sync {
    /// Resolve a voluntary move; `None` when the destination is blocked.
    fn resolve_move(&self, world: &dyn WorldReader, from: Vec3, delta: Vec3) -> Option<Vec3>;

    /// Advance a body by `millis` of simulated time.
    fn step(&self, world: &dyn WorldReader, body: Body, millis: u64) -> Body;
}

/// Gravity plus block collision for two-block-tall bodies.
#[derive(Debug, Clone, Copy)]
pub struct SimplePhysics {
    /// Blocks per second squared, negative is down.
    pub gravity: f32,
    pub terminal_velocity: f32,
}

impl Default for SimplePhysics {
    fn default() -> Self {
        Self {
            gravity: -9.8,
            terminal_velocity: 30.0,
        }
    }
}

fn body_blocked(world: &dyn WorldReader, location: Vec3) -> bool {
    let feet = AbsoluteLocation::containing(location);
    world.is_solid(feet) || world.is_solid(feet.relative(0, 0, 1))
}

fn on_ground(world: &dyn WorldReader, location: Vec3) -> bool {
    let feet = AbsoluteLocation::containing(location);
    location.z == feet.z as f32 && world.is_solid(feet.relative(0, 0, -1))
}

impl Physics for SimplePhysics {
    fn resolve_move(&self, world: &dyn WorldReader, from: Vec3, delta: Vec3) -> Option<Vec3> {
        let destination = from + delta;
        (!body_blocked(world, destination)).then_some(destination)
    }

    fn step(&self, world: &dyn WorldReader, body: Body, millis: u64) -> Body {
        let grounded = on_ground(world, body.location);
        if grounded && body.velocity == Vec3::ZERO {
            return body;
        }
        let seconds = millis as f32 / 1000.0;
        let mut velocity = body.velocity;
        if grounded {
            velocity.z = velocity.z.max(0.0);
        } else {
            velocity.z = (velocity.z + self.gravity * seconds).max(-self.terminal_velocity);
        }

        let mut location = body.location;
        let sideways = Vec3::new(
            location.x + velocity.x * seconds,
            location.y + velocity.y * seconds,
            location.z,
        );
        if body_blocked(world, sideways) {
            velocity.x = 0.0;
            velocity.y = 0.0;
        } else {
            location = sideways;
        }

        let target_z = location.z + velocity.z * seconds;
        let feet = AbsoluteLocation::containing(location);
        if velocity.z < 0.0 {
            let lowest = target_z.floor() as i32;
            let landing = (lowest..feet.z)
                .rev()
                .find(|z| world.is_solid(AbsoluteLocation::new(feet.x, feet.y, *z)));
            match landing {
                Some(z) => {
                    location.z = (z + 1) as f32;
                    velocity.z = 0.0;
                }
                None => location.z = target_z,
            }
        } else if velocity.z > 0.0 {
            let head = AbsoluteLocation::containing(Vec3::new(location.x, location.y, target_z + 1.0));
            if world.is_solid(head) {
                velocity.z = 0.0;
            } else {
                location.z = target_z;
            }
        }
        Body { location, velocity }
    }
}
