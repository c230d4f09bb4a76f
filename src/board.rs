use core::ops::Index;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// One playing field: fixed cell values plus the mutable reveal and mark
/// matrices. Discarded wholesale on reset, never shared across games.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    values: Array2<CellValue>,
    revealed: Array2<bool>,
    marks: Array2<Mark>,
    mine_count: CellCount,
}

impl Board {
    /// Mine-free board; mines are added through [`Board::place_mine`].
    pub(crate) fn empty(size: Coord2) -> Self {
        Self {
            values: Array2::default(size.to_nd_index()),
            revealed: Array2::default(size.to_nd_index()),
            marks: Array2::default(size.to_nd_index()),
            mine_count: 0,
        }
    }

    /// Board with mines at exactly the given coordinates, for deterministic
    /// layouts. Duplicate coordinates collapse into one mine.
    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut board = Self::empty(size);

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::InvalidCoords);
            }
            board.place_mine(coords);
        }

        Ok(board)
    }

    /// Places a mine and bumps the adjacency count of every in-bounds
    /// neighbor. Returns false if the cell already held a mine.
    pub(crate) fn place_mine(&mut self, coords: Coord2) -> bool {
        if self[coords].is_mine() {
            return false;
        }

        self.values[coords.to_nd_index()] = CellValue::Mine;
        self.mine_count += 1;

        for pos in self.iter_neighbors(coords) {
            if let CellValue::Clear(count) = &mut self.values[pos.to_nd_index()] {
                *count += 1;
            }
        }

        true
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig::new_unchecked(self.size(), self.mine_count)
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.values.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn total_cells(&self) -> CellCount {
        self.values.len().try_into().unwrap()
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn is_mine(&self, coords: Coord2) -> bool {
        self[coords].is_mine()
    }

    pub fn is_revealed(&self, coords: Coord2) -> bool {
        self.revealed[coords.to_nd_index()]
    }

    /// Monotonic: reveal state is never cleared, only regenerated away.
    pub(crate) fn set_revealed(&mut self, coords: Coord2) {
        self.revealed[coords.to_nd_index()] = true;
    }

    pub fn mark(&self, coords: Coord2) -> Mark {
        self.marks[coords.to_nd_index()]
    }

    pub(crate) fn set_mark(&mut self, coords: Coord2, mark: Mark) {
        self.marks[coords.to_nd_index()] = mark;
    }

    /// Adopts the marks of a same-sized board, used when the fairness policy
    /// swaps the mine layout under the player's annotations.
    pub(crate) fn carry_marks_from(&mut self, other: &Board) {
        debug_assert_eq!(self.size(), other.size());
        self.marks = other.marks.clone();
    }

    pub(crate) fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.values.iter_neighbors(coords)
    }

    pub fn iter_mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        let (rows, cols) = self.size();
        (0..rows)
            .flat_map(move |row| (0..cols).map(move |col| (row, col)))
            .filter(|&coords| self.is_mine(coords))
    }
}

impl Index<Coord2> for Board {
    type Output = CellValue;

    fn index(&self, (row, col): Coord2) -> &Self::Output {
        &self.values[(row as usize, col as usize)]
    }
}
