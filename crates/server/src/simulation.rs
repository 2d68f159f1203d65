use glam::Vec3;

use lanblock::LocalWorld;
use lanblock::net::PlayerFlags;

const WALK_SPEED: f32 = 2.0;
const TURN_RATE: f32 = 0.35;

/// Keeps the host's player moving so clients have something to watch.
pub struct HostWalker {
    origin: Vec3,
    yaw: f32,
}

impl HostWalker {
    pub fn new(origin: Vec3) -> Self {
        Self { origin, yaw: 0.0 }
    }

    pub fn step(&mut self, world: &mut LocalWorld, dt: f32) {
        self.yaw = (self.yaw + TURN_RATE * dt).rem_euclid(std::f32::consts::TAU);

        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let velocity = Vec3::new(-sin_yaw, 0.0, cos_yaw) * WALK_SPEED;

        let player = &mut world.player;
        player.velocity = velocity;
        player.position += velocity * dt;
        player.position.y = self.origin.y;
        player.yaw = self.yaw.to_degrees();
        player.pitch = 0.0;
        player.flags = PlayerFlags::GROUNDED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walker_stays_on_ground() {
        let origin = Vec3::new(0.0, 64.0, 0.0);
        let mut world = LocalWorld::new(origin);
        let mut walker = HostWalker::new(origin);

        for _ in 0..100 {
            walker.step(&mut world, 0.05);
        }

        assert_eq!(world.player.position.y, 64.0);
        assert!(world.player.position.distance(origin) > 0.0);
        assert!((world.player.velocity.length() - WALK_SPEED).abs() < 1e-4);
        assert!(world.player.flags.contains(PlayerFlags::GROUNDED));
    }
}
