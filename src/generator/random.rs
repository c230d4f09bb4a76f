use serde::{Deserialize, Serialize};

use super::*;

/// Uniform random mine placement by rejection sampling: draw `(row, col)`
/// pairs and resample collisions with already-placed mines. Expected
/// O(mines) draws for sparse boards; always terminates because the config
/// guarantees at least one mine-free cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomBoardGenerator {
    seed: u64,
}

impl RandomBoardGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl BoardGenerator for RandomBoardGenerator {
    fn generate(self, config: GameConfig) -> Board {
        use rand::prelude::*;

        let (rows, cols) = config.size;
        let mut board = Board::empty(config.size);
        let mut rng = SmallRng::seed_from_u64(self.seed);

        while board.mine_count() < config.mines {
            let coords = (rng.random_range(0..rows), rng.random_range(0..cols));
            if !board.place_mine(coords) {
                log::trace!("Mine already at {:?}, resampling", coords);
            }
        }

        board
    }
}
