//! Board and game engine for Fourfold.
//!
//! Everything in this crate is plain synchronous state: no tasks, no
//! locks, no I/O. Callers that share a [`Game`] across tasks wrap it in
//! their own lock (the hub keeps one per session), which is what makes
//! every mutation below happen one at a time.
//!
//! # Key types
//!
//! - [`Board`]: the 6×7 grid, gravity, and line detection
//! - [`Game`]: turns, move log, and the status state machine
//! - [`Seat`]: which of the two discs a player drops
//! - [`MoveError`]: why a move (or forfeit) was refused

mod board;
mod error;
mod game;

pub use board::{Board, COLUMNS, DIRECTIONS, ROWS, Seat, neighbor};
pub use error::{MoveError, ParseBoardError};
pub use game::{
    Game, GameId, GameResult, GameStatus, Move, Outcome, PlayerInfo,
};
