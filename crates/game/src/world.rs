use std::collections::HashMap;

use glam::{IVec3, Vec3};

use crate::net::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Block {
    pub block_type: u16,
    pub metadata: u8,
}

impl Block {
    pub const AIR: Self = Self {
        block_type: 0,
        metadata: 0,
    };

    pub fn new(block_type: u16, metadata: u8) -> Self {
        Self {
            block_type,
            metadata,
        }
    }

    pub fn is_air(&self) -> bool {
        self.block_type == 0
    }
}

/// Game state the networking core reads from and writes into.
///
/// The block store and the local player's kinematics are owned by the
/// embedding game; the server and the client only reach them through this
/// trait, once per poll or tick.
pub trait GameWorld {
    fn get_block(&self, pos: IVec3) -> Block;
    fn set_block(&mut self, pos: IVec3, block: Block);
    fn player_state(&self) -> PlayerState;
    fn time_of_day(&self) -> f32;
    fn set_time_of_day(&mut self, time: f32);
}

/// In-memory world used by the dedicated binaries and by tests.
#[derive(Debug, Default)]
pub struct LocalWorld {
    blocks: HashMap<IVec3, Block>,
    pub player: PlayerState,
    pub time_of_day: f32,
}

impl LocalWorld {
    pub fn new(spawn: Vec3) -> Self {
        Self {
            blocks: HashMap::new(),
            player: PlayerState::new(0, spawn),
            time_of_day: 0.0,
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Advances the clock by `hours`, wrapping at 24.
    pub fn advance_time(&mut self, hours: f32) {
        self.time_of_day = (self.time_of_day + hours).rem_euclid(24.0);
    }
}

impl GameWorld for LocalWorld {
    fn get_block(&self, pos: IVec3) -> Block {
        self.blocks.get(&pos).copied().unwrap_or(Block::AIR)
    }

    fn set_block(&mut self, pos: IVec3, block: Block) {
        if block.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    fn player_state(&self) -> PlayerState {
        self.player
    }

    fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    fn set_time_of_day(&mut self, time: f32) {
        self.time_of_day = time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_blocks_are_air() {
        let world = LocalWorld::default();
        assert_eq!(world.get_block(IVec3::new(1, 2, 3)), Block::AIR);
    }

    #[test]
    fn test_set_and_clear_block() {
        let mut world = LocalWorld::default();
        let pos = IVec3::new(-5, 60, 7);
        world.set_block(pos, Block::new(4, 1));
        assert_eq!(world.get_block(pos), Block::new(4, 1));
        assert_eq!(world.block_count(), 1);

        world.set_block(pos, Block::AIR);
        assert_eq!(world.block_count(), 0);
    }

    #[test]
    fn test_time_wraps() {
        let mut world = LocalWorld::default();
        world.set_time_of_day(23.5);
        world.advance_time(1.0);
        assert!((world.time_of_day() - 0.5).abs() < 1e-5);
    }
}
