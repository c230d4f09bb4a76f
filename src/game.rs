use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::*;

/// Regeneration ceiling for the fair-start policy.
const MAX_REARRANGE_ATTEMPTS: u8 = 10;
/// Above this mine density the fair-start policy gives up immediately.
const FAIR_START_DENSITY_LIMIT: f32 = 0.9;

/// Valid transitions:
/// - Setup -> Playing (at game construction)
/// - Playing -> Won
/// - Playing -> Lost
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Setup,
    Playing,
    Won,
    Lost,
}

impl GamePhase {
    /// Indicates the game has ended and no moves can be made anymore.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for GamePhase {
    fn default() -> Self {
        Self::Setup
    }
}

/// Outcome of a mark toggle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    NoChange,
    Changed,
}

impl MarkOutcome {
    /// Whether this outcome could have caused an update to the game.
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

/// Outcome of revealing a cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    MineStruck,
    Won,
}

impl RevealOutcome {
    /// Whether this outcome could have caused an update to the game.
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            MineStruck => true,
            Won => true,
        }
    }
}

/// Represents a game from start to finish.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    config: GameConfig,
    board: Board,
    phase: GamePhase,
    safe_revealed: CellCount,
    flags_placed: CellCount,
    rearranges: u8,
    seed: u64,
    losing_cell: Option<Coord2>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Starts a game on a freshly generated board. The config must come from
    /// [`GameConfig::new`], which rejects invalid dimensions and mine counts.
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let board = RandomBoardGenerator::new(seed).generate(config);
        Self::with_board(config, board, seed)
    }

    /// Starts a game on a fixed board, for deterministic layouts.
    pub fn from_board(board: Board, seed: u64) -> Self {
        let config = board.game_config();
        Self::with_board(config, board, seed)
    }

    fn with_board(config: GameConfig, board: Board, seed: u64) -> Self {
        let now = Utc::now();
        log::debug!("started at {}", now);
        Self {
            config,
            board,
            phase: GamePhase::Playing,
            safe_revealed: 0,
            flags_placed: 0,
            rearranges: 0,
            seed,
            losing_cell: None,
            started_at: now,
            ended_at: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn ended(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn size(&self) -> Coord2 {
        self.board.size()
    }

    pub fn total_mines(&self) -> CellCount {
        self.board.mine_count()
    }

    pub fn safe_revealed(&self) -> CellCount {
        self.safe_revealed
    }

    pub fn flags_placed(&self) -> CellCount {
        self.flags_placed
    }

    /// How many mines have not been flagged yet.
    pub fn mines_left(&self) -> isize {
        (self.board.mine_count() as isize) - (self.flags_placed as isize)
    }

    /// The exact cell whose reveal ended the game, never an arbitrary mine.
    pub fn losing_cell(&self) -> Option<Coord2> {
        self.losing_cell
    }

    /// How many times the fair-start policy regenerated the board.
    pub fn rearrange_count(&self) -> u8 {
        self.rearranges
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds elapsed at `now`, frozen once the game has ended.
    pub fn elapsed_secs_at(&self, now: DateTime<Utc>) -> u32 {
        (self.ended_at.unwrap_or(now) - self.started_at)
            .num_seconds()
            .max(0) as u32
    }

    /// How many seconds have passed since the game started.
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs_at(Utc::now())
    }

    /// Reveals a cell, cascading through zero-count regions. Already revealed
    /// or marked cells are left alone.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let mut revealed = Vec::new();
        self.reveal_tracked(coords, &mut revealed)
    }

    /// Like [`Game::reveal`], but appends every newly disclosed cell to
    /// `revealed`, including mines disclosed at game end.
    pub fn reveal_tracked(
        &mut self,
        coords: Coord2,
        revealed: &mut Vec<Coord2>,
    ) -> Result<RevealOutcome> {
        let coords = self.board.validate_coords(coords)?;
        self.check_not_ended()?;

        if self.board.is_revealed(coords) || !self.board.mark(coords).is_none() {
            return Ok(RevealOutcome::NoChange);
        }

        if self.safe_revealed == 0 && self.board.is_mine(coords) {
            self.rearrange_mines(coords);
        }

        Ok(self.open_cell(coords, revealed))
    }

    /// Fair-start policy: while the first click would strike a mine, swap in
    /// a freshly generated board and re-test the same cell. Gives up above
    /// the density limit or at the attempt ceiling, accepting the loss.
    fn rearrange_mines(&mut self, coords: Coord2) {
        let area = self.config.total_cells();
        if (self.config.mines as f32) >= FAIR_START_DENSITY_LIMIT * (area as f32) {
            log::debug!("Mine density too high, first click may lose");
            return;
        }

        while self.board.is_mine(coords) && self.rearranges < MAX_REARRANGE_ATTEMPTS {
            self.rearranges += 1;
            log::debug!(
                "Rearranging mines to spare the first click at {:?}, attempt {}",
                coords,
                self.rearranges
            );

            let generator =
                RandomBoardGenerator::new(self.seed.wrapping_add(self.rearranges as u64));
            let mut board = generator.generate(self.config);
            board.carry_marks_from(&self.board);
            self.board = board;
        }
    }

    /// Opens a single hidden, unmarked cell and flood-fills if it is a zero.
    fn open_cell(&mut self, coords: Coord2, revealed: &mut Vec<Coord2>) -> RevealOutcome {
        match self.board[coords] {
            CellValue::Mine => {
                self.board.set_revealed(coords);
                revealed.push(coords);
                self.losing_cell = Some(coords);
                self.end_game(false, revealed);
                RevealOutcome::MineStruck
            }
            CellValue::Clear(count) => {
                self.disclose(coords, revealed);
                log::debug!("Revealed cell at {:?}, mine count: {}", coords, count);

                if count == 0 {
                    self.flood_fill(coords, revealed);
                }

                if self.safe_revealed == self.board.safe_cell_count() {
                    self.end_game(true, revealed);
                    RevealOutcome::Won
                } else {
                    RevealOutcome::Revealed
                }
            }
        }
    }

    /// Work-list traversal of the connected zero region around `start` plus
    /// its numbered border. The visited check precedes every enqueue, so each
    /// cell is processed at most once and the loop terminates on any grid.
    fn flood_fill(&mut self, start: Coord2, revealed: &mut Vec<Coord2>) {
        let mut visited = HashSet::from([start]);
        let mut to_visit: VecDeque<_> = self
            .board
            .iter_neighbors(start)
            .filter(|&pos| self.can_flood_into(pos))
            .collect();
        log::trace!(
            "Starting flood-fill from {:?}, initial neighbors: {:?}",
            start,
            to_visit
        );

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            if !self.can_flood_into(visit_coords) {
                continue;
            }

            let CellValue::Clear(visit_count) = self.board[visit_coords] else {
                continue;
            };
            self.disclose(visit_coords, revealed);
            log::trace!(
                "Flood revealed cell at {:?}, mine count: {}",
                visit_coords,
                visit_count
            );

            if visit_count == 0 {
                to_visit.extend(
                    self.board
                        .iter_neighbors(visit_coords)
                        .filter(|&pos| self.can_flood_into(pos))
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }
    }

    /// Cascades only pass through hidden, unmarked, mine-free cells.
    fn can_flood_into(&self, coords: Coord2) -> bool {
        !self.board.is_revealed(coords)
            && self.board.mark(coords).is_none()
            && !self.board.is_mine(coords)
    }

    fn disclose(&mut self, coords: Coord2, revealed: &mut Vec<Coord2>) {
        self.board.set_revealed(coords);
        self.safe_revealed += 1;
        revealed.push(coords);
    }

    /// Flag a hidden cell, or clear an existing flag. Placement is capped at
    /// the mine count; clearing always succeeds.
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        use MarkOutcome::*;

        let coords = self.board.validate_coords(coords)?;
        self.check_not_ended()?;

        if self.board.is_revealed(coords) {
            return Ok(NoChange);
        }

        Ok(match self.board.mark(coords) {
            Mark::Flag => {
                self.board.set_mark(coords, Mark::None);
                self.flags_placed -= 1;
                Changed
            }
            _ if self.flags_placed < self.board.mine_count() => {
                self.board.set_mark(coords, Mark::Flag);
                self.flags_placed += 1;
                Changed
            }
            _ => {
                log::debug!("Flag limit reached, ignoring flag at {:?}", coords);
                NoChange
            }
        })
    }

    /// Question-mark a hidden cell, or clear an existing question mark. A
    /// flag is overwritten, releasing its slot.
    pub fn toggle_question(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        use MarkOutcome::*;

        let coords = self.board.validate_coords(coords)?;
        self.check_not_ended()?;

        if self.board.is_revealed(coords) {
            return Ok(NoChange);
        }

        Ok(match self.board.mark(coords) {
            Mark::Question => {
                self.board.set_mark(coords, Mark::None);
                Changed
            }
            Mark::Flag => {
                self.board.set_mark(coords, Mark::Question);
                self.flags_placed -= 1;
                Changed
            }
            Mark::None => {
                self.board.set_mark(coords, Mark::Question);
                Changed
            }
        })
    }

    /// Remove whatever mark a cell carries.
    pub fn clear_mark(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        use MarkOutcome::*;

        let coords = self.board.validate_coords(coords)?;
        self.check_not_ended()?;

        Ok(match self.board.mark(coords) {
            Mark::None => NoChange,
            Mark::Flag => {
                self.board.set_mark(coords, Mark::None);
                self.flags_placed -= 1;
                Changed
            }
            Mark::Question => {
                self.board.set_mark(coords, Mark::None);
                Changed
            }
        })
    }

    fn end_game(&mut self, won: bool, revealed: &mut Vec<Coord2>) {
        if self.phase.is_terminal() {
            return;
        }

        self.phase = if won { GamePhase::Won } else { GamePhase::Lost };
        let now = Utc::now();
        self.ended_at = Some(now);
        log::debug!("ended at {}, phase {:?}", now, self.phase);

        self.disclose_mines(won, revealed);
    }

    /// End-of-game display: on a win the remaining mines are flagged, on a
    /// loss every unflagged mine is uncovered. Correctly flagged mines keep
    /// their flag so the display can tell them from the struck cell.
    fn disclose_mines(&mut self, won: bool, revealed: &mut Vec<Coord2>) {
        let mines: Vec<Coord2> = self.board.iter_mines().collect();

        for coords in mines {
            match (won, self.board.mark(coords)) {
                (_, Mark::Flag) => {}
                (true, _) => {
                    self.board.set_mark(coords, Mark::Flag);
                    self.flags_placed += 1;
                }
                (false, mark) => {
                    if !mark.is_none() {
                        self.board.set_mark(coords, Mark::None);
                    }
                    if !self.board.is_revealed(coords) {
                        self.board.set_revealed(coords);
                        revealed.push(coords);
                    }
                }
            }
        }
    }

    fn check_not_ended(&self) -> Result<()> {
        if self.phase.is_terminal() {
            Err(GameError::AlreadyEnded)
        } else {
            Ok(())
        }
    }
}
