//! Core protocol types for Fourfold's wire format.
//!
//! This module defines every type that travels "on the wire". Inbound
//! and outbound traffic use different enums because the two directions
//! share no message kinds: clients ask ([`ClientMessage`]), the server
//! tells ([`ServerMessage`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A board as it appears on the wire: 6 rows × 7 columns, row 0 on top,
/// each cell `0` (empty), `1` (first seat), or `2` (second seat).
pub type BoardGrid = Vec<Vec<u8>>;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wrapper around every outbound message.
///
/// ```text
/// ┌──────────────────────────────────────────┐
/// │ type: "move_made"                        │  ← message kind
/// │ payload: { column, row, player, board }  │  ← kind-specific data
/// │ timestamp: "2026-01-01T12:00:00Z"        │  ← when the server sent it
/// └──────────────────────────────────────────┘
/// ```
///
/// `type` and `payload` come from the flattened [`ServerMessage`], which
/// is adjacently tagged. Only the server builds envelopes, so this type
/// is serialize-only; inbound frames are decoded by the
/// [`Codec`](crate::Codec).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<M> {
    #[serde(flatten)]
    pub message: M,

    /// UTC wall-clock time the envelope was created.
    pub timestamp: DateTime<Utc>,
}

impl<M> Envelope<M> {
    /// Wraps a message, stamping it with the current time.
    pub fn now(message: M) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage (client → server)
// ---------------------------------------------------------------------------

/// `join_queue` payload.
///
/// The connection's identity is the username from the handshake; the
/// field here is accepted for compatibility and otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinQueuePayload {
    #[serde(default)]
    pub username: Option<String>,
}

/// `make_move` payload.
///
/// `column` is signed so that out-of-range values (including negative
/// ones) reach the game engine and get the proper `invalid column`
/// rejection instead of a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMovePayload {
    pub column: i64,
}

/// Every message kind a client may send, decoded once at the router
/// boundary and matched exhaustively from there on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `join_queue { username }`
    JoinQueue(JoinQueuePayload),
    /// `make_move { column }`
    MakeMove(MakeMovePayload),
    /// `leave_game {}`
    LeaveGame,
    /// `resume_session {}`
    ResumeSession,
    /// `abandon_session {}`
    AbandonSession,
}

impl ClientMessage {
    pub const JOIN_QUEUE: &'static str = "join_queue";
    pub const MAKE_MOVE: &'static str = "make_move";
    pub const LEAVE_GAME: &'static str = "leave_game";
    pub const RESUME_SESSION: &'static str = "resume_session";
    pub const ABANDON_SESSION: &'static str = "abandon_session";

    /// The wire name of this message's `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinQueue(_) => Self::JOIN_QUEUE,
            Self::MakeMove(_) => Self::MAKE_MOVE,
            Self::LeaveGame => Self::LEAVE_GAME,
            Self::ResumeSession => Self::RESUME_SESSION,
            Self::AbandonSession => Self::ABANDON_SESSION,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage (server → client)
// ---------------------------------------------------------------------------

/// Every message kind the server sends.
///
/// `#[serde(tag = "type", content = "payload")]` produces "adjacently
/// tagged" JSON:
///   `{ "type": "queue_joined", "payload": { "position": 1 } }`
///
/// Variant names become snake_case (`QueueJoined` → `queue_joined`) and
/// payload fields become camelCase (`game_id` → `gameId`), matching what
/// the browser client expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// You're in the queue. `position` is 1-based; 0 means you were
    /// paired immediately.
    QueueJoined { position: usize },

    /// A game was created with you in it.
    GameStarted {
        game_id: String,
        opponent: String,
        your_turn: bool,
        your_color: u8,
    },

    /// A disc was dropped (by either seat).
    MoveMade {
        column: usize,
        row: usize,
        player: u8,
        board: BoardGrid,
    },

    /// Your move was rejected; nothing changed.
    InvalidMove { reason: String },

    /// The game ended. `winner` is a username or `"draw"`; `result` is
    /// this recipient's outcome: `win`, `loss`, `draw`, or `forfeit`.
    GameOver {
        winner: String,
        result: String,
        final_board: BoardGrid,
    },

    /// Your opponent dropped; they have `timeout_seconds` to come back.
    OpponentDisconnected { timeout_seconds: u64 },

    /// Your opponent is back.
    OpponentReconnected {},

    /// The game ended because a seat gave it up (left or timed out).
    GameForfeited { winner: String },

    /// Full snapshot sent to a reconnecting client.
    GameState {
        game_id: String,
        board: BoardGrid,
        current_turn: u8,
        your_color: u8,
        your_turn: bool,
        opponent: String,
    },

    /// Something about your request was wrong. The connection stays open.
    Error { message: String },
}

impl ServerMessage {
    /// Shorthand for an [`ServerMessage::Error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client parses these exact JSON shapes, so a serde
    //! attribute mismatch here is a protocol break.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_queue_joined_shape() {
        let value = serde_json::to_value(ServerMessage::QueueJoined {
            position: 1,
        })
        .unwrap();

        assert_eq!(
            value,
            json!({ "type": "queue_joined", "payload": { "position": 1 } })
        );
    }

    #[test]
    fn test_server_message_game_started_uses_camel_case_fields() {
        let value = serde_json::to_value(ServerMessage::GameStarted {
            game_id: "g-1".into(),
            opponent: "bob".into(),
            your_turn: true,
            your_color: 1,
        })
        .unwrap();

        assert_eq!(value["type"], "game_started");
        assert_eq!(value["payload"]["gameId"], "g-1");
        assert_eq!(value["payload"]["yourTurn"], true);
        assert_eq!(value["payload"]["yourColor"], 1);
    }

    #[test]
    fn test_server_message_opponent_reconnected_has_empty_payload() {
        let value =
            serde_json::to_value(ServerMessage::OpponentReconnected {})
                .unwrap();

        assert_eq!(
            value,
            json!({ "type": "opponent_reconnected", "payload": {} })
        );
    }

    #[test]
    fn test_server_message_opponent_disconnected_timeout_field() {
        let value = serde_json::to_value(
            ServerMessage::OpponentDisconnected { timeout_seconds: 30 },
        )
        .unwrap();

        assert_eq!(value["payload"]["timeoutSeconds"], 30);
    }

    #[test]
    fn test_server_message_game_over_final_board_field() {
        let value = serde_json::to_value(ServerMessage::GameOver {
            winner: "draw".into(),
            result: "draw".into(),
            final_board: vec![vec![0; 7]; 6],
        })
        .unwrap();

        assert_eq!(value["type"], "game_over");
        assert_eq!(value["payload"]["finalBoard"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_envelope_flattens_message_next_to_timestamp() {
        let env = Envelope::now(ServerMessage::error("boom"));

        let value = serde_json::to_value(&env).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["message"], "boom");
        assert!(value["timestamp"].is_string(), "timestamp should be RFC 3339");
    }

    #[test]
    fn test_client_message_kind_names() {
        assert_eq!(
            ClientMessage::MakeMove(MakeMovePayload { column: 3 }).kind(),
            "make_move"
        );
        assert_eq!(ClientMessage::AbandonSession.kind(), "abandon_session");
    }
}
