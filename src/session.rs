use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::*;

/// Which annotation a click places while active. `None` means clicks reveal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkMode {
    None,
    Flag,
    Question,
}

impl Default for MarkMode {
    fn default() -> Self {
        Self::None
    }
}

/// Everything the presentation layer needs to redraw after one click.
#[derive(Clone, Debug, PartialEq)]
pub struct ClickResult {
    pub phase: GamePhase,
    /// Cells newly disclosed by this click, in disclosure order, including
    /// mines uncovered for the end-of-game display.
    pub revealed: Vec<Coord2>,
    pub mine_struck: bool,
    pub losing_cell: Option<Coord2>,
}

impl ClickResult {
    fn ignored(phase: GamePhase) -> Self {
        Self {
            phase,
            revealed: Vec::new(),
            mine_struck: false,
            losing_cell: None,
        }
    }
}

/// Owns the current game and the click-dispatch rules. The UI feeds it plain
/// coordinates and configuration values; it never reads anything back from
/// the UI.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    game: Option<Game>,
    mark_mode: MarkMode,
}

impl GameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any game in progress with a fresh one. Fails with
    /// `InvalidConfiguration` instead of clamping bad settings.
    pub fn new_game(&mut self, rows: Coord, cols: Coord, mines: CellCount, seed: u64) -> Result<()> {
        let config = GameConfig::new((rows, cols), mines)?;
        log::debug!("new game: {}x{} with {} mines", rows, cols, mines);
        self.game = Some(Game::new(config, seed));
        self.mark_mode = MarkMode::None;
        Ok(())
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn phase(&self) -> GamePhase {
        self.game
            .as_ref()
            .map(Game::phase)
            .unwrap_or(GamePhase::Setup)
    }

    pub fn mark_mode(&self) -> MarkMode {
        self.mark_mode
    }

    pub fn set_mark_mode(&mut self, mode: MarkMode) {
        self.mark_mode = mode;
    }

    /// Dispatches one click. Clicks with no game, after the game has ended,
    /// or outside the board are ignored. While a mark mode is active the
    /// click toggles the mark and never reveals; otherwise a click on a
    /// marked cell clears the mark, and anything else reveals.
    pub fn handle_click(&mut self, coords: Coord2) -> ClickResult {
        let Some(game) = self.game.as_mut() else {
            return ClickResult::ignored(GamePhase::Setup);
        };
        if game.ended() || game.board().validate_coords(coords).is_err() {
            return ClickResult::ignored(game.phase());
        }

        let mut revealed = Vec::new();
        let mut mine_struck = false;

        match self.mark_mode {
            MarkMode::Flag => {
                let _ = game.toggle_flag(coords);
            }
            MarkMode::Question => {
                let _ = game.toggle_question(coords);
            }
            MarkMode::None if !game.board().mark(coords).is_none() => {
                let _ = game.clear_mark(coords);
            }
            MarkMode::None => {
                if let Ok(outcome) = game.reveal_tracked(coords, &mut revealed) {
                    mine_struck = matches!(outcome, RevealOutcome::MineStruck);
                }
            }
        }

        ClickResult {
            phase: game.phase(),
            revealed,
            mine_struck,
            losing_cell: game.losing_cell(),
        }
    }

    /// Applies the active mark mode to a cell without going through a click.
    pub fn toggle_mark(&mut self, coords: Coord2) -> MarkOutcome {
        let Some(game) = self.game.as_mut() else {
            return MarkOutcome::NoChange;
        };
        if game.ended() {
            return MarkOutcome::NoChange;
        }

        match self.mark_mode {
            MarkMode::None => MarkOutcome::NoChange,
            MarkMode::Flag => game.toggle_flag(coords).unwrap_or(MarkOutcome::NoChange),
            MarkMode::Question => game.toggle_question(coords).unwrap_or(MarkOutcome::NoChange),
        }
    }

    /// Elapsed whole seconds at `now`; pure, so the caller picks the render
    /// cadence. Stops advancing the moment the game ends, and reads 0 before
    /// the first game.
    pub fn tick(&self, now: DateTime<Utc>) -> u32 {
        self.game
            .as_ref()
            .map(|game| game.elapsed_secs_at(now))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_board(size: Coord2, mines: &[Coord2]) -> GameSession {
        GameSession {
            game: Some(Game::from_board(
                Board::from_mine_coords(size, mines).unwrap(),
                0,
            )),
            mark_mode: MarkMode::None,
        }
    }

    #[test]
    fn clicks_before_any_game_are_ignored() {
        let mut session = GameSession::new();

        let result = session.handle_click((0, 0));

        assert_eq!(result, ClickResult::ignored(GamePhase::Setup));
        assert_eq!(session.tick(Utc::now()), 0);
    }

    #[test]
    fn new_game_rejects_invalid_configurations() {
        let mut session = GameSession::new();

        assert!(matches!(
            session.new_game(0, 5, 1, 0),
            Err(GameError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            session.new_game(2, 2, 4, 0),
            Err(GameError::InvalidConfiguration { .. })
        ));
        assert_eq!(session.phase(), GamePhase::Setup);
    }

    #[test]
    fn new_game_starts_playing() {
        let mut session = GameSession::new();

        session.new_game(9, 9, 10, 1).unwrap();

        assert_eq!(session.phase(), GamePhase::Playing);
        assert_eq!(session.game().unwrap().total_mines(), 10);
    }

    #[test]
    fn out_of_bounds_clicks_are_ignored() {
        let mut session = session_with_board((2, 2), &[(0, 0)]);

        let result = session.handle_click((5, 5));

        assert_eq!(result, ClickResult::ignored(GamePhase::Playing));
    }

    #[test]
    fn click_reports_the_whole_cascade() {
        let mut session = session_with_board((1, 3), &[(0, 0)]);

        let result = session.handle_click((0, 2));

        assert_eq!(result.phase, GamePhase::Won);
        assert!(!result.mine_struck);
        assert_eq!(result.revealed, vec![(0, 2), (0, 1)]);
        assert_eq!(result.losing_cell, None);
    }

    #[test]
    fn losing_click_reports_struck_and_disclosed_mines() {
        let mut session = session_with_board((2, 3), &[(0, 0), (1, 2)]);
        session.handle_click((0, 1));

        let result = session.handle_click((1, 2));

        assert_eq!(result.phase, GamePhase::Lost);
        assert!(result.mine_struck);
        assert_eq!(result.losing_cell, Some((1, 2)));
        assert!(result.revealed.contains(&(1, 2)));
        assert!(result.revealed.contains(&(0, 0)));
    }

    #[test]
    fn clicks_after_the_game_ends_are_ignored() {
        let mut session = session_with_board((2, 3), &[(0, 0), (1, 2)]);
        session.handle_click((0, 1));
        session.handle_click((1, 2));

        let result = session.handle_click((0, 2));

        assert_eq!(result, ClickResult::ignored(GamePhase::Lost));
    }

    #[test]
    fn flag_mode_click_marks_instead_of_revealing() {
        let mut session = session_with_board((2, 2), &[(0, 0)]);
        session.set_mark_mode(MarkMode::Flag);

        let result = session.handle_click((1, 1));

        assert_eq!(result.phase, GamePhase::Playing);
        assert!(result.revealed.is_empty());
        assert_eq!(session.game().unwrap().board().mark((1, 1)), Mark::Flag);
        assert!(!session.game().unwrap().board().is_revealed((1, 1)));
    }

    #[test]
    fn clicking_a_flagged_cell_unflags_instead_of_revealing() {
        let mut session = session_with_board((2, 2), &[(0, 0)]);
        session.set_mark_mode(MarkMode::Flag);
        session.handle_click((1, 1));
        session.set_mark_mode(MarkMode::None);

        let result = session.handle_click((1, 1));

        assert!(result.revealed.is_empty());
        assert_eq!(session.game().unwrap().board().mark((1, 1)), Mark::None);
        assert!(!session.game().unwrap().board().is_revealed((1, 1)));

        // next click actually reveals
        let result = session.handle_click((1, 1));
        assert_eq!(result.revealed, vec![(1, 1)]);
    }

    #[test]
    fn toggle_mark_follows_the_active_mode() {
        let mut session = session_with_board((2, 2), &[(0, 0)]);

        assert_eq!(session.toggle_mark((1, 1)), MarkOutcome::NoChange);

        session.set_mark_mode(MarkMode::Question);
        assert_eq!(session.toggle_mark((1, 1)), MarkOutcome::Changed);
        assert_eq!(session.game().unwrap().board().mark((1, 1)), Mark::Question);
    }

    #[test]
    fn tick_is_frozen_after_the_game_ends() {
        let mut session = session_with_board((2, 3), &[(0, 0), (1, 2)]);
        session.handle_click((0, 1));
        session.handle_click((1, 2));

        let started = session.game().unwrap().started_at();

        assert_eq!(session.tick(started + chrono::Duration::seconds(60)), 0);
    }

    #[test]
    fn session_round_trips_through_serde() {
        let mut session = session_with_board((2, 3), &[(0, 0), (1, 2)]);
        session.handle_click((0, 1));
        session.set_mark_mode(MarkMode::Flag);

        let json = serde_json::to_string(&session).unwrap();
        let restored: GameSession = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, session);
    }
}
