use glam::{IVec3, Vec3};

use lanblock::net::PlayerFlags;
use lanblock::{Block, LocalWorld};

const WALK_SPEED: f32 = 3.0;
const LEASH: f32 = 24.0;

/// Scripted player: walks a square around its spawn and hands out block
/// placements next to where it stands.
pub struct Bot {
    spawn: Vec3,
    heading: usize,
    leg_time: f32,
    edits: u32,
    block: Block,
}

const HEADINGS: [Vec3; 4] = [Vec3::X, Vec3::Z, Vec3::NEG_X, Vec3::NEG_Z];
const LEG_SECONDS: f32 = 4.0;

impl Bot {
    pub fn new(spawn: Vec3, block_type: u16) -> Self {
        Self {
            spawn,
            heading: 0,
            leg_time: 0.0,
            edits: 0,
            block: Block::new(block_type, 0),
        }
    }

    pub fn step(&mut self, world: &mut LocalWorld, dt: f32) {
        self.leg_time += dt;
        if self.leg_time >= LEG_SECONDS {
            self.leg_time -= LEG_SECONDS;
            self.heading = (self.heading + 1) % HEADINGS.len();
        }

        let direction = HEADINGS[self.heading];
        let player = &mut world.player;
        player.velocity = direction * WALK_SPEED;
        player.position += player.velocity * dt;

        let offset = player.position - self.spawn;
        if offset.length() > LEASH {
            player.position = self.spawn + offset.normalize() * LEASH;
        }

        player.yaw = direction.x.atan2(direction.z).to_degrees();
        player.flags = PlayerFlags::GROUNDED;
    }

    /// The next block to place: alternately set and cleared, one step ahead
    /// of the player and one below eye level.
    pub fn next_edit(&mut self, world: &LocalWorld) -> (IVec3, Block) {
        self.edits += 1;
        let ahead = world.player.position + HEADINGS[self.heading] * 2.0;
        let target = ahead.floor().as_ivec3() - IVec3::Y;
        let block = if self.edits % 2 == 0 {
            Block::AIR
        } else {
            self.block
        };
        (target, block)
    }

    pub fn edits(&self) -> u32 {
        self.edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_stays_on_leash() {
        let spawn = Vec3::new(0.0, 64.0, 0.0);
        let mut world = LocalWorld::new(spawn);
        let mut bot = Bot::new(spawn, 1);

        for _ in 0..2000 {
            bot.step(&mut world, 0.05);
        }
        assert!(world.player.position.distance(spawn) <= LEASH + 1e-3);
    }

    #[test]
    fn test_edits_stay_within_reach() {
        let spawn = Vec3::new(10.0, 64.0, -5.0);
        let mut world = LocalWorld::new(spawn);
        let mut bot = Bot::new(spawn, 3);

        for _ in 0..50 {
            bot.step(&mut world, 0.1);
            let (target, _) = bot.next_edit(&world);
            assert!(target.as_vec3().distance(world.player.position) <= 8.0);
        }
    }

    #[test]
    fn test_edits_alternate_place_and_clear() {
        let spawn = Vec3::ZERO;
        let world = LocalWorld::new(spawn);
        let mut bot = Bot::new(spawn, 5);

        assert_eq!(bot.next_edit(&world).1, Block::new(5, 0));
        assert!(bot.next_edit(&world).1.is_air());
        assert_eq!(bot.edits(), 2);
    }
}
