//! Analytics hook.
//!
//! The router reports game lifecycle events to an [`EventSink`]. Publishing
//! is fire-and-forget: a failing sink is logged and gameplay carries on.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fourfold_engine::{Game, GameId, GameResult, Seat};
use serde::Serialize;
use uuid::Uuid;

/// One published event.
///
/// Serializes as
/// `{"id": "...", "type": "game.move", "data": {...}, "timestamp": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEvent {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// A game was created.
    pub fn started(game: &Game) -> Self {
        Self::new(EventKind::GameStarted {
            game_id: game.id(),
            seat_one: game.player(Seat::One).username.clone(),
            seat_two: game.player(Seat::Two).username.clone(),
            is_bot_game: game.has_bot(),
        })
    }

    /// The latest move in `game` was applied.
    pub fn latest_move(game: &Game) -> Option<Self> {
        let last = game.moves().last()?;
        Some(Self::new(EventKind::GameMove {
            game_id: game.id(),
            player: game.player(last.seat).username.clone(),
            column: last.column,
            move_number: last.sequence,
        }))
    }

    /// `game` finished. `None` if it hasn't.
    pub fn ended(game: &Game) -> Option<Self> {
        Some(Self::new(EventKind::GameEnded {
            game_id: game.id(),
            winner: game.winner_name().to_string(),
            result: game.result()?,
            duration_secs: game.duration_secs(),
            total_moves: game.moves().len(),
        }))
    }

    /// Dotted event name, e.g. `game.ended`.
    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::GameStarted { .. } => "game.started",
            EventKind::GameMove { .. } => "game.move",
            EventKind::GameEnded { .. } => "game.ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum EventKind {
    #[serde(rename = "game.started")]
    GameStarted {
        game_id: GameId,
        seat_one: String,
        seat_two: String,
        is_bot_game: bool,
    },

    #[serde(rename = "game.move")]
    GameMove {
        game_id: GameId,
        player: String,
        column: usize,
        move_number: usize,
    },

    #[serde(rename = "game.ended")]
    GameEnded {
        game_id: GameId,
        /// Username or `"draw"`.
        winner: String,
        result: GameResult,
        duration_secs: i64,
        total_moves: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for [`GameEvent`]s.
pub trait EventSink: Send + Sync + 'static {
    fn publish(
        &self,
        event: GameEvent,
    ) -> impl Future<Output = Result<(), EventError>> + Send;
}

impl<T: EventSink> EventSink for Arc<T> {
    fn publish(
        &self,
        event: GameEvent,
    ) -> impl Future<Output = Result<(), EventError>> + Send {
        (**self).publish(event)
    }
}

/// Writes every event to the log at `info`. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    async fn publish(&self, event: GameEvent) -> Result<(), EventError> {
        match &event.kind {
            EventKind::GameStarted {
                game_id,
                seat_one,
                seat_two,
                is_bot_game,
            } => tracing::info!(
                event = event.name(),
                %game_id,
                %seat_one,
                %seat_two,
                is_bot_game,
                "game event"
            ),
            EventKind::GameMove {
                game_id,
                player,
                column,
                move_number,
            } => tracing::info!(
                event = event.name(),
                %game_id,
                %player,
                column,
                move_number,
                "game event"
            ),
            EventKind::GameEnded {
                game_id,
                winner,
                result,
                duration_secs,
                total_moves,
            } => tracing::info!(
                event = event.name(),
                %game_id,
                %winner,
                ?result,
                duration_secs,
                total_moves,
                "game event"
            ),
        }
        Ok(())
    }
}
