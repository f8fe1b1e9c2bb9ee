//! Turn-based match state for one room.
//!
//! A [`GameSession`] wraps a [`Grid`] with the bookkeeping a match needs:
//! whose turn it is, how many moves were accepted, who is eliminated and who
//! won. Players are addressed by [`PlayerIndex`], their position in the
//! roster captured at [`GameSession::new`]. That roster never changes, so an
//! index stays meaningful after the player leaves the room.
//!
//! Elimination is only evaluated once every starting player had a chance to
//! move (`move_count >= roster.len()`). A player who leaves mid-match
//! forfeits immediately: their index is eliminated, their orbs stay on the
//! board, and the match ends if a single player remains.

use thiserror::Error;
use tracing::warn;

use crate::grid::{CascadeReport, Grid, PlacementError, PlayerIndex};
use crate::protocol::{GameStateSnapshot, PlayerId};

/// Why a move was dropped. Moves are never answered with an error; the
/// reason only feeds logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("player is not part of this match")]
    UnknownPlayer,
    #[error("the match is over")]
    GameOver,
    #[error("not this player's turn (turn belongs to index {turn})")]
    NotYourTurn { turn: PlayerIndex },
    #[error("coordinates are outside the grid")]
    OutOfBounds,
    #[error("cell is owned by player index {0}")]
    CellOwnedByOther(PlayerIndex),
}

impl From<PlacementError> for MoveRejection {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::OutOfBounds => Self::OutOfBounds,
            PlacementError::OwnedByOther(owner) => Self::CellOwnedByOther(owner),
        }
    }
}

/// What an accepted move did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Index of the player who moved.
    pub player: PlayerIndex,
    pub cascade: CascadeReport,
    /// Indices that became eliminated as a result of this move.
    pub newly_eliminated: Vec<PlayerIndex>,
    /// Winner, if this move ended the match.
    pub winner: Option<PlayerIndex>,
}

/// State of one match.
#[derive(Debug, Clone)]
pub struct GameSession {
    roster: Vec<PlayerId>,
    grid: Grid,
    turn: PlayerIndex,
    move_count: u32,
    eliminated: Vec<bool>,
    departed: Vec<bool>,
    game_over: bool,
    winner: Option<PlayerIndex>,
    cascade_limit: usize,
}

impl GameSession {
    /// Start a match for `roster` on an empty `rows × cols` grid.
    pub fn new(roster: Vec<PlayerId>, rows: usize, cols: usize, cascade_limit: usize) -> Self {
        let players = roster.len();
        Self {
            roster,
            grid: Grid::new(rows, cols),
            turn: 0,
            move_count: 0,
            eliminated: vec![false; players],
            departed: vec![false; players],
            game_over: false,
            winner: None,
            cascade_limit,
        }
    }

    /// Player ids in turn order.
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Index of the player expected to move next.
    pub fn turn(&self) -> PlayerIndex {
        self.turn
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn eliminated(&self) -> &[bool] {
        &self.eliminated
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<PlayerIndex> {
        self.winner
    }

    /// Roster position of `player`.
    pub fn player_index(&self, player: &str) -> Option<PlayerIndex> {
        self.roster.iter().position(|p| p == player)
    }

    /// Apply a move for `player` at column `x`, row `y`.
    ///
    /// On success the orb is placed, the cascade resolved, elimination
    /// evaluated and the turn advanced.
    ///
    /// # Errors
    ///
    /// Returns a [`MoveRejection`] and leaves the session untouched if the
    /// move is illegal.
    pub fn apply_move(
        &mut self,
        player: &str,
        x: i64,
        y: i64,
    ) -> Result<MoveOutcome, MoveRejection> {
        let index = self
            .player_index(player)
            .ok_or(MoveRejection::UnknownPlayer)?;
        if self.game_over {
            return Err(MoveRejection::GameOver);
        }
        if self.turn != index {
            return Err(MoveRejection::NotYourTurn { turn: self.turn });
        }
        let (Ok(col), Ok(row)) = (usize::try_from(x), usize::try_from(y)) else {
            return Err(MoveRejection::OutOfBounds);
        };

        self.grid.place_orb(col, row, index)?;
        self.move_count += 1;

        let cascade = self.grid.resolve_cascade(self.cascade_limit);
        if cascade.truncated {
            warn!(
                passes = cascade.passes,
                "cascade hit the pass limit; leaving grid as last computed"
            );
        }

        let newly_eliminated = self.evaluate_elimination();
        if !self.game_over {
            self.advance_turn();
        }

        Ok(MoveOutcome {
            player: index,
            cascade,
            newly_eliminated,
            winner: self.winner,
        })
    }

    /// Record that `player` left the room.
    ///
    /// Returns `true` if a running match changed as a result (the player
    /// forfeited, and possibly the turn moved or the match ended).
    pub fn forfeit(&mut self, player: &str) -> bool {
        let Some(index) = self.player_index(player) else {
            return false;
        };
        match self.departed.get_mut(index) {
            Some(departed) if !*departed => *departed = true,
            _ => return false,
        }
        if self.game_over {
            return false;
        }

        if let Some(flag) = self.eliminated.get_mut(index) {
            *flag = true;
        }
        self.settle_last_standing();
        if !self.game_over && self.turn == index {
            self.advance_turn();
        }
        true
    }

    /// Snapshot for a `game_state` broadcast.
    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot {
            grid: self.grid.clone(),
            turn: self.turn,
            move_count: self.move_count,
            eliminated: self.eliminated.clone(),
            game_over: self.game_over,
            winner: self.winner,
        }
    }

    fn evaluate_elimination(&mut self) -> Vec<PlayerIndex> {
        if (self.move_count as usize) < self.roster.len() {
            return Vec::new();
        }

        let owners = self.grid.owners();
        let mut newly_eliminated = Vec::new();
        for (index, flag) in self.eliminated.iter_mut().enumerate() {
            let departed = self.departed.get(index).copied().unwrap_or(false);
            let out = departed || (!owners.is_empty() && !owners.contains(&index));
            if out && !*flag {
                newly_eliminated.push(index);
            }
            *flag = out;
        }

        let mut owners = owners.into_iter();
        if let (Some(sole_owner), None) = (owners.next(), owners.next()) {
            self.finish(sole_owner);
        }
        self.settle_last_standing();
        newly_eliminated
    }

    /// End the match if exactly one index is still in play.
    fn settle_last_standing(&mut self) {
        if self.game_over {
            return;
        }
        let mut remaining = self
            .eliminated
            .iter()
            .enumerate()
            .filter(|(_, out)| !**out)
            .map(|(index, _)| index);
        if let (Some(last), None) = (remaining.next(), remaining.next()) {
            self.finish(last);
        }
    }

    fn finish(&mut self, winner: PlayerIndex) {
        self.game_over = true;
        self.winner = Some(winner);
    }

    /// Move the turn to the next index that is not eliminated.
    fn advance_turn(&mut self) {
        let players = self.roster.len();
        for step in 1..=players {
            let candidate = (self.turn + step) % players;
            if !self.eliminated.get(candidate).copied().unwrap_or(true) {
                self.turn = candidate;
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::grid::{Cell, DEFAULT_CASCADE_LIMIT};

    fn session(players: &[&str], rows: usize, cols: usize) -> GameSession {
        GameSession::new(
            players.iter().map(|p| (*p).to_string()).collect(),
            rows,
            cols,
            DEFAULT_CASCADE_LIMIT,
        )
    }

    fn with_cells(mut session: GameSession, cells: &[(usize, usize, PlayerIndex, u32)]) -> GameSession {
        let mut rows: Vec<Vec<Cell>> = session.grid.clone().into();
        for &(x, y, owner, count) in cells {
            rows[y][x] = Cell {
                owner: Some(owner),
                count,
            };
        }
        session.grid = Grid::try_from(rows).unwrap();
        session
    }

    fn cell(owner: PlayerIndex, count: u32) -> Cell {
        Cell {
            owner: Some(owner),
            count,
        }
    }

    #[test]
    fn new_session_starts_clean() {
        let s = session(&["a", "b", "c"], 6, 9);
        assert_eq!(s.turn(), 0);
        assert_eq!(s.move_count(), 0);
        assert_eq!(s.eliminated(), &[false, false, false]);
        assert!(!s.is_over());
        assert_eq!(s.winner(), None);
        assert_eq!(s.grid().rows(), 6);
        assert_eq!(s.grid().cols(), 9);
    }

    #[test]
    fn two_by_two_opening_sequence() {
        let mut s = session(&["a", "b"], 2, 2);

        s.apply_move("a", 0, 0).unwrap();
        assert_eq!(s.grid().cell(0, 0), Some(&cell(0, 1)));
        assert_eq!(s.turn(), 1);

        s.apply_move("b", 1, 1).unwrap();
        assert_eq!(s.grid().cell(1, 1), Some(&cell(1, 1)));
        assert_eq!(s.turn(), 0);

        let outcome = s.apply_move("a", 0, 0).unwrap();
        assert_eq!(outcome.cascade.passes, 1);
        assert!(s.grid().cell(0, 0).unwrap().is_empty());
        assert_eq!(s.grid().cell(1, 0), Some(&cell(0, 1)));
        assert_eq!(s.grid().cell(0, 1), Some(&cell(0, 1)));
        assert_eq!(s.grid().cell(1, 1), Some(&cell(1, 1)));
        assert_eq!(s.turn(), 1);
        assert_eq!(s.move_count(), 3);
        assert!(!s.is_over());
    }

    #[test]
    fn illegal_moves_leave_state_untouched() {
        let mut s = session(&["a", "b"], 3, 3);
        s.apply_move("a", 0, 0).unwrap();
        let before = s.snapshot();

        assert_eq!(s.apply_move("zed", 1, 1), Err(MoveRejection::UnknownPlayer));
        assert_eq!(
            s.apply_move("a", 1, 1),
            Err(MoveRejection::NotYourTurn { turn: 1 })
        );
        assert_eq!(s.apply_move("b", 3, 0), Err(MoveRejection::OutOfBounds));
        assert_eq!(s.apply_move("b", 0, -1), Err(MoveRejection::OutOfBounds));
        assert_eq!(
            s.apply_move("b", 0, 0),
            Err(MoveRejection::CellOwnedByOther(0))
        );

        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn elimination_waits_for_every_player_to_move() {
        let mut s = session(&["a", "b"], 3, 3);
        s.apply_move("a", 1, 1).unwrap();
        // Only player 0 owns cells, but player 1 has not moved yet.
        assert_eq!(s.move_count(), 1);
        assert_eq!(s.eliminated(), &[false, false]);
        assert!(!s.is_over());
        assert_eq!(s.turn(), 1);
    }

    #[test]
    fn capturing_every_cell_wins() {
        let mut s = with_cells(session(&["a", "b"], 3, 3), &[(0, 0, 0, 1), (1, 0, 1, 1)]);
        s.move_count = 2;

        let outcome = s.apply_move("a", 0, 0).unwrap();

        assert_eq!(s.grid().owners().into_iter().collect::<Vec<_>>(), vec![0]);
        assert!(s.is_over());
        assert_eq!(s.winner(), Some(0));
        assert_eq!(outcome.winner, Some(0));
        assert_eq!(outcome.newly_eliminated, vec![1]);
        assert_eq!(s.eliminated(), &[false, true]);
        // Turn does not advance after the final move.
        assert_eq!(s.turn(), 0);
    }

    #[test]
    fn no_moves_after_game_over() {
        let mut s = with_cells(session(&["a", "b"], 3, 3), &[(0, 0, 0, 1), (1, 0, 1, 1)]);
        s.move_count = 2;
        s.apply_move("a", 0, 0).unwrap();
        let before = s.snapshot();

        assert_eq!(s.apply_move("a", 2, 2), Err(MoveRejection::GameOver));
        assert_eq!(s.apply_move("b", 2, 2), Err(MoveRejection::GameOver));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn turn_skips_eliminated_players() {
        let mut s = with_cells(
            session(&["a", "b", "c"], 3, 3),
            &[(0, 0, 0, 1), (2, 2, 2, 1)],
        );
        s.move_count = 3;

        let outcome = s.apply_move("a", 1, 1).unwrap();

        assert_eq!(outcome.newly_eliminated, vec![1]);
        assert_eq!(s.eliminated(), &[false, true, false]);
        assert_eq!(s.turn(), 2);
        assert!(!s.is_over());

        s.apply_move("c", 2, 0).unwrap();
        assert_eq!(s.turn(), 0);
    }

    #[test]
    fn cells_stay_consistent_through_a_long_game() {
        let mut s = session(&["a", "b", "c"], 4, 5);
        let players = ["a", "b", "c"];
        let mut accepted = 0;
        for step in 0..400_i64 {
            if s.is_over() {
                break;
            }
            let who = players[s.turn()];
            let (x, y) = ((step * 7) % 5, (step * 3) % 4);
            if s.apply_move(who, x, y).is_ok() {
                accepted += 1;
            } else {
                // Fall back to any legal cell for the current player.
                let turn = s.turn();
                let target = (0..4)
                    .flat_map(|y| (0..5).map(move |x| (x, y)))
                    .find(|&(x, y)| {
                        s.grid()
                            .cell(x, y)
                            .is_some_and(|c| c.owner.is_none() || c.owner == Some(turn))
                    })
                    .unwrap();
                s.apply_move(who, target.0 as i64, target.1 as i64).unwrap();
                accepted += 1;
            }
            for c in s.grid().cells() {
                assert_eq!(c.owner.is_none(), c.count == 0);
            }
            if !s.is_over() {
                assert!(!s.eliminated()[s.turn()]);
            }
        }
        assert!(accepted > 0);
    }

    #[test]
    fn forfeit_of_opponent_ends_two_player_match() {
        let mut s = session(&["a", "b"], 3, 3);
        s.apply_move("a", 0, 0).unwrap();

        assert!(s.forfeit("b"));
        assert!(s.is_over());
        assert_eq!(s.winner(), Some(0));
        assert_eq!(s.eliminated(), &[false, true]);
    }

    #[test]
    fn forfeit_on_own_turn_passes_the_turn() {
        let mut s = session(&["a", "b", "c"], 3, 3);
        s.apply_move("a", 0, 0).unwrap();
        assert_eq!(s.turn(), 1);

        assert!(s.forfeit("b"));
        assert!(!s.is_over());
        assert_eq!(s.turn(), 2);
        assert_eq!(s.eliminated(), &[false, true, false]);
        assert_eq!(s.apply_move("b", 1, 1), Err(MoveRejection::NotYourTurn { turn: 2 }));
    }

    #[test]
    fn departed_player_stays_eliminated_after_evaluation() {
        let mut s = session(&["a", "b", "c"], 3, 3);
        s.apply_move("a", 0, 0).unwrap();
        s.apply_move("b", 2, 2).unwrap();
        assert!(s.forfeit("b"));
        s.apply_move("c", 2, 0).unwrap();
        // b still owns (2,2) but has left.
        assert_eq!(s.eliminated(), &[false, true, false]);
        assert_eq!(s.turn(), 0);
    }

    #[test]
    fn forfeit_is_idempotent_and_ignores_strangers() {
        let mut s = session(&["a", "b", "c"], 3, 3);
        assert!(s.forfeit("c"));
        assert!(!s.forfeit("c"));
        assert!(!s.forfeit("nobody"));
    }
}
