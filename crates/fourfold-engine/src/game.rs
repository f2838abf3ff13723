//! A single game: two players, a board, and the turn/status state machine.
//!
//! ```text
//!                 set_disconnected
//!   InProgress ───────────────────► Disconnected
//!        │     ◄───────────────────      │
//!        │        set_reconnected        │
//!        │                               │ forfeit
//!        │ win / draw / forfeit          │
//!        ▼                               ▼
//!     Finished ◄─────────────────────────┘
//! ```
//!
//! `Finished` is terminal: moves are refused with
//! [`MoveError::NotInProgress`] and connectivity changes no longer touch
//! the status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Board, MoveError, Seat};

// ---------------------------------------------------------------------------
// Identifiers and records
// ---------------------------------------------------------------------------

/// Unique identifier for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GameId(Uuid);

impl GameId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player as seen by one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub id: Uuid,
    pub username: String,
    pub is_bot: bool,
    pub connected: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
    /// How many times this seat has dropped. Each disconnect gets the
    /// next number, so it identifies one specific disconnect.
    pub disconnects: u64,
}

impl PlayerInfo {
    /// A connected human player with a fresh id.
    pub fn human(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            is_bot: false,
            connected: true,
            disconnected_at: None,
            disconnects: 0,
        }
    }

    /// The synthesized bot seat. Bots are always "connected".
    pub fn bot(username: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::human(username)
        }
    }
}

/// One recorded move. Never modified after it's appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Move {
    pub seat: Seat,
    pub column: usize,
    pub row: usize,
    /// 1-based position in the move log.
    pub sequence: usize,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status, result, outcome
// ---------------------------------------------------------------------------

/// Lifecycle status of a game. See the module docs for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    InProgress,
    Disconnected,
    Finished,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// How a finished game ended, from the game's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    SeatOneWin,
    SeatTwoWin,
    Draw,
    Forfeit,
}

impl GameResult {
    fn win_for(seat: Seat) -> Self {
        match seat {
            Seat::One => Self::SeatOneWin,
            Seat::Two => Self::SeatTwoWin,
        }
    }
}

/// How a finished game ended for one particular seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    /// Both seats see `forfeit` when a game ends by forfeit; `winner`
    /// tells them who got it.
    Forfeit,
}

impl Outcome {
    /// The label used in `game_over.result`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
            Self::Draw => "draw",
            Self::Forfeit => "forfeit",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// The complete state of one game.
#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    players: [PlayerInfo; 2],
    board: Board,
    current_turn: Seat,
    moves: Vec<Move>,
    status: GameStatus,
    result: Option<GameResult>,
    winner: Option<Seat>,
    winning_cells: Vec<(usize, usize)>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Starts a game. Seat one moves first.
    pub fn new(seat_one: PlayerInfo, seat_two: PlayerInfo) -> Self {
        Self {
            id: GameId::new(),
            players: [seat_one, seat_two],
            board: Board::new(),
            current_turn: Seat::One,
            moves: Vec::new(),
            status: GameStatus::InProgress,
            result: None,
            winner: None,
            winning_cells: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Plays `seat`'s disc into `column`, returning the landing row.
    ///
    /// Checks run in order: status, turn, column. After a successful drop
    /// the game either finishes (win, then draw) or passes the turn.
    ///
    /// # Errors
    /// Any [`MoveError`]; the game is unchanged when one is returned.
    pub fn make_move(
        &mut self,
        seat: Seat,
        column: usize,
    ) -> Result<usize, MoveError> {
        if self.status != GameStatus::InProgress {
            return Err(MoveError::NotInProgress);
        }
        if self.current_turn != seat {
            return Err(MoveError::NotYourTurn);
        }

        let row = self.board.drop_disc(column, seat)?;
        let now = Utc::now();
        self.moves.push(Move {
            seat,
            column,
            row,
            sequence: self.moves.len() + 1,
            timestamp: now,
        });

        if let Some(cells) = self.board.winning_line(row, column) {
            self.finish(GameResult::win_for(seat), Some(seat), now);
            self.winning_cells = cells;
        } else if self.board.is_full() {
            self.finish(GameResult::Draw, None, now);
        } else {
            self.current_turn = seat.opponent();
        }
        Ok(row)
    }

    /// Ends the game with `loser` giving it up; the other seat wins.
    ///
    /// Allowed from `InProgress` and `Disconnected`.
    ///
    /// # Errors
    /// `NotInProgress` if the game already finished; the earlier result
    /// stands.
    pub fn forfeit(&mut self, loser: Seat) -> Result<(), MoveError> {
        if self.is_finished() {
            return Err(MoveError::NotInProgress);
        }
        self.finish(GameResult::Forfeit, Some(loser.opponent()), Utc::now());
        Ok(())
    }

    /// Marks `seat` as gone and pauses the game.
    pub fn set_disconnected(&mut self, seat: Seat) {
        let player = &mut self.players[seat.index()];
        player.connected = false;
        player.disconnected_at = Some(Utc::now());
        player.disconnects += 1;
        if self.status == GameStatus::InProgress {
            self.status = GameStatus::Disconnected;
        }
    }

    /// Marks `seat` as back. Play resumes only once every human seat is
    /// connected again.
    pub fn set_reconnected(&mut self, seat: Seat) {
        let player = &mut self.players[seat.index()];
        player.connected = true;
        player.disconnected_at = None;

        let opponent = &self.players[seat.opponent().index()];
        if self.status == GameStatus::Disconnected
            && (opponent.connected || opponent.is_bot)
        {
            self.status = GameStatus::InProgress;
        }
    }

    fn finish(
        &mut self,
        result: GameResult,
        winner: Option<Seat>,
        at: DateTime<Utc>,
    ) {
        self.status = GameStatus::Finished;
        self.result = Some(result);
        self.winner = winner;
        self.ended_at = Some(at);
    }

    // -- Queries ------------------------------------------------------------

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Seat {
        self.current_turn
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn winner(&self) -> Option<Seat> {
        self.winner
    }

    /// Cells of the winning line. Empty unless the game ended in a win.
    pub fn winning_cells(&self) -> &[(usize, usize)] {
        &self.winning_cells
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn player(&self, seat: Seat) -> &PlayerInfo {
        &self.players[seat.index()]
    }

    pub fn opponent_of(&self, seat: Seat) -> &PlayerInfo {
        &self.players[seat.opponent().index()]
    }

    /// Which seat the human `username` occupies, if any. The bot seat
    /// never matches, whatever its name.
    pub fn seat_of(&self, username: &str) -> Option<Seat> {
        Seat::BOTH.into_iter().find(|&seat| {
            let player = &self.players[seat.index()];
            !player.is_bot && player.username == username
        })
    }

    /// `true` if either seat is the bot.
    pub fn has_bot(&self) -> bool {
        self.players.iter().any(|p| p.is_bot)
    }

    /// The bot's seat, for bot games.
    pub fn bot_seat(&self) -> Option<Seat> {
        Seat::BOTH
            .into_iter()
            .find(|&seat| self.players[seat.index()].is_bot)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Whole seconds from start to end (or to now, while running).
    pub fn duration_secs(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }

    /// The winner's username, or `"draw"` when nobody won.
    pub fn winner_name(&self) -> &str {
        match self.winner {
            Some(seat) => &self.player(seat).username,
            None => "draw",
        }
    }

    /// The finished game's result as `seat` experienced it.
    pub fn outcome_for(&self, seat: Seat) -> Option<Outcome> {
        Some(match self.result? {
            GameResult::Draw => Outcome::Draw,
            GameResult::Forfeit => Outcome::Forfeit,
            GameResult::SeatOneWin | GameResult::SeatTwoWin => {
                if self.winner == Some(seat) {
                    Outcome::Win
                } else {
                    Outcome::Loss
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{COLUMNS, ROWS};

    fn game() -> Game {
        Game::new(PlayerInfo::human("alice"), PlayerInfo::human("bob"))
    }

    fn bot_game() -> Game {
        Game::new(PlayerInfo::human("alice"), PlayerInfo::bot("Bot"))
    }

    /// Plays alternating moves from seat one.
    fn play(game: &mut Game, columns: &[usize]) {
        for &col in columns {
            let seat = game.current_turn();
            game.make_move(seat, col)
                .unwrap_or_else(|e| panic!("move {col} by {seat}: {e}"));
        }
    }

    #[test]
    fn test_new_game_starts_with_seat_one_in_progress() {
        let g = game();
        assert_eq!(g.status(), GameStatus::InProgress);
        assert_eq!(g.current_turn(), Seat::One);
        assert!(g.moves().is_empty());
        assert_eq!(g.result(), None);
    }

    #[test]
    fn test_make_move_vertical_win_sets_winning_cells() {
        let mut g = game();
        play(&mut g, &[3, 4, 3, 4, 3, 4, 3]);

        assert_eq!(g.status(), GameStatus::Finished);
        assert_eq!(g.result(), Some(GameResult::SeatOneWin));
        assert_eq!(g.winner(), Some(Seat::One));

        let mut cells = g.winning_cells().to_vec();
        cells.sort();
        assert_eq!(cells, vec![(2, 3), (3, 3), (4, 3), (5, 3)]);
        assert!(g.ended_at().is_some());
    }

    #[test]
    fn test_make_move_alternates_turns() {
        let mut g = game();
        assert_eq!(g.make_move(Seat::One, 0), Ok(5));
        assert_eq!(g.current_turn(), Seat::Two);
        assert_eq!(g.make_move(Seat::Two, 0), Ok(4));
        assert_eq!(g.current_turn(), Seat::One);
    }

    #[test]
    fn test_make_move_out_of_turn_is_rejected_without_change() {
        let mut g = game();
        assert_eq!(g.make_move(Seat::Two, 3), Err(MoveError::NotYourTurn));
        assert_eq!(g.board().disc_count(), 0);
        assert_eq!(g.current_turn(), Seat::One);
    }

    #[test]
    fn test_make_move_validation_order() {
        // Wrong turn beats bad column.
        let mut g = game();
        assert_eq!(g.make_move(Seat::Two, 99), Err(MoveError::NotYourTurn));
        assert_eq!(g.make_move(Seat::One, 99), Err(MoveError::InvalidColumn));

        // Status beats everything.
        g.set_disconnected(Seat::Two);
        assert_eq!(g.make_move(Seat::Two, 99), Err(MoveError::NotInProgress));
    }

    #[test]
    fn test_make_move_full_column_is_rejected() {
        let mut g = game();
        play(&mut g, &[0, 0, 0, 0, 0, 0]);
        assert_eq!(g.make_move(Seat::One, 0), Err(MoveError::ColumnFull));
        assert_eq!(g.moves().len(), 6);
        assert_eq!(g.current_turn(), Seat::One);
    }

    #[test]
    fn test_make_move_draw_when_board_fills() {
        // Final board, bottom row first, columns typed A A B B A A B where
        // A = X O X O X O and B = O X O X O X going up:
        //
        //   XXOOXXO / OOXXOOX / ... alternating
        //
        // No line of four exists in it, so none can form along the way.
        // Each (A, B) pair is filled level by level; who moves first at a
        // level flips with the level's parity.
        let mut order = Vec::new();
        for (a, b) in [(0, 2), (1, 3), (4, 6)] {
            for level in 0..ROWS {
                if level % 2 == 0 {
                    order.extend([a, b]);
                } else {
                    order.extend([b, a]);
                }
            }
        }
        order.extend(std::iter::repeat_n(5, ROWS));

        let mut g = game();
        for col in order {
            let seat = g.current_turn();
            g.make_move(seat, col).unwrap();
        }

        assert_eq!(g.status(), GameStatus::Finished);
        assert_eq!(g.result(), Some(GameResult::Draw));
        assert_eq!(g.winner(), None);
        assert!(g.winning_cells().is_empty());
        assert_eq!(g.board().disc_count(), ROWS * COLUMNS);
        assert_eq!(g.winner_name(), "draw");
    }

    #[test]
    fn test_make_move_after_finish_is_rejected() {
        let mut g = game();
        play(&mut g, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(g.make_move(Seat::Two, 4), Err(MoveError::NotInProgress));
        assert_eq!(g.moves().len(), 7);
    }

    #[test]
    fn test_move_log_sequence_and_disc_count_agree() {
        let mut g = game();
        play(&mut g, &[3, 3, 2, 4, 6, 0]);

        let seqs: Vec<usize> = g.moves().iter().map(|m| m.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(g.board().disc_count(), g.moves().len());
        assert_eq!(g.moves()[1].row, 4);
        assert_eq!(g.moves()[1].seat, Seat::Two);
    }

    #[test]
    fn test_forfeit_assigns_opponent_as_winner() {
        for loser in Seat::BOTH {
            let mut g = game();
            g.forfeit(loser).unwrap();
            assert_eq!(g.status(), GameStatus::Finished);
            assert_eq!(g.result(), Some(GameResult::Forfeit));
            assert_eq!(g.winner(), Some(loser.opponent()));
            assert!(g.winning_cells().is_empty());
        }
    }

    #[test]
    fn test_forfeit_from_disconnected() {
        let mut g = game();
        g.set_disconnected(Seat::One);
        g.forfeit(Seat::One).unwrap();
        assert_eq!(g.winner(), Some(Seat::Two));
        assert_eq!(g.winner_name(), "bob");
    }

    #[test]
    fn test_forfeit_after_finish_keeps_result() {
        let mut g = game();
        play(&mut g, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(g.forfeit(Seat::One), Err(MoveError::NotInProgress));
        assert_eq!(g.result(), Some(GameResult::SeatOneWin));
    }

    #[test]
    fn test_disconnect_and_reconnect_preserve_board_and_turn() {
        let mut g = game();
        play(&mut g, &[3, 4, 2]);
        let board = *g.board();

        g.set_disconnected(Seat::Two);
        assert_eq!(g.status(), GameStatus::Disconnected);
        assert!(!g.player(Seat::Two).connected);
        assert!(g.player(Seat::Two).disconnected_at.is_some());

        g.set_reconnected(Seat::Two);
        assert_eq!(g.status(), GameStatus::InProgress);
        assert_eq!(*g.board(), board);
        assert_eq!(g.current_turn(), Seat::Two);
        assert!(g.player(Seat::Two).disconnected_at.is_none());
    }

    #[test]
    fn test_reconnect_waits_for_both_seats() {
        let mut g = game();
        g.set_disconnected(Seat::One);
        g.set_disconnected(Seat::Two);

        g.set_reconnected(Seat::One);
        assert_eq!(g.status(), GameStatus::Disconnected);
        assert!(g.make_move(Seat::One, 0).is_err());
        assert!(g.moves().is_empty());

        g.set_reconnected(Seat::Two);
        assert_eq!(g.status(), GameStatus::InProgress);
    }

    #[test]
    fn test_reconnect_against_bot_resumes() {
        let mut g = bot_game();
        g.set_disconnected(Seat::One);
        g.set_reconnected(Seat::One);
        assert_eq!(g.status(), GameStatus::InProgress);
        assert_eq!(g.bot_seat(), Some(Seat::Two));
    }

    #[test]
    fn test_connectivity_changes_leave_finished_alone() {
        let mut g = game();
        g.forfeit(Seat::Two).unwrap();
        g.set_disconnected(Seat::One);
        assert_eq!(g.status(), GameStatus::Finished);
        g.set_reconnected(Seat::One);
        assert_eq!(g.status(), GameStatus::Finished);
    }

    #[test]
    fn test_outcome_for_each_seat() {
        let mut won = game();
        play(&mut won, &[3, 4, 3, 4, 3, 4, 3]);
        assert_eq!(won.outcome_for(Seat::One), Some(Outcome::Win));
        assert_eq!(won.outcome_for(Seat::Two), Some(Outcome::Loss));
        assert_eq!(won.winner_name(), "alice");

        let mut forfeited = game();
        forfeited.forfeit(Seat::One).unwrap();
        assert_eq!(forfeited.outcome_for(Seat::One), Some(Outcome::Forfeit));
        assert_eq!(forfeited.outcome_for(Seat::Two), Some(Outcome::Forfeit));

        assert_eq!(game().outcome_for(Seat::One), None);
    }

    #[test]
    fn test_seat_of_finds_players() {
        let g = game();
        assert_eq!(g.seat_of("alice"), Some(Seat::One));
        assert_eq!(g.seat_of("bob"), Some(Seat::Two));
        assert_eq!(g.seat_of("carol"), None);
        assert!(!g.has_bot());
    }

    #[test]
    fn test_seat_of_never_matches_bot() {
        let g = Game::new(PlayerInfo::human("carol"), PlayerInfo::bot("Bot"));
        assert_eq!(g.seat_of("carol"), Some(Seat::One));
        assert_eq!(g.seat_of("Bot"), None);
        assert_eq!(g.bot_seat(), Some(Seat::Two));
    }

    #[test]
    fn test_set_disconnected_counts_each_disconnect() {
        let mut g = game();
        assert_eq!(g.player(Seat::One).disconnects, 0);

        g.set_disconnected(Seat::One);
        g.set_reconnected(Seat::One);
        g.set_disconnected(Seat::One);

        assert_eq!(g.player(Seat::One).disconnects, 2);
        assert_eq!(g.player(Seat::Two).disconnects, 0);
    }
}
