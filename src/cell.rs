use serde::{Deserialize, Serialize};

/// Fixed content of a cell, decided at board generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    Mine,
    /// Count of mines among the in-bounds 8-neighbors, 0..=8.
    Clear(u8),
}

impl CellValue {
    pub const fn is_mine(self) -> bool {
        matches!(self, Self::Mine)
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::Clear(0)
    }
}

/// Player annotation on an unrevealed cell, independent of the mine model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    None,
    Flag,
    Question,
}

impl Mark {
    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for Mark {
    fn default() -> Self {
        Self::None
    }
}
