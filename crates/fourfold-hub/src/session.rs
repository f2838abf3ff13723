//! A running game plus the connections currently playing it.

use fourfold_engine::{Game, GameId, Seat};
use fourfold_protocol::ServerMessage;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ClientHandle;

/// Binds a [`Game`] to the live connections representing its seats.
///
/// The game sits behind its own `RwLock`: every state change takes the
/// write half, so a move and a firing deadline can never interleave,
/// while turn and status checks share the read half.
///
/// A seat's handle is `None` while that player is disconnected, and
/// always `None` for the bot.
///
/// Lock order is registry → game → seats. Never call back into the
/// [`Hub`](crate::Hub) while holding a game guard.
#[derive(Debug)]
pub struct GameSession {
    id: GameId,
    usernames: [String; 2],
    bot_seat: Option<Seat>,
    game: RwLock<Game>,
    seats: RwLock<[Option<ClientHandle>; 2]>,
}

impl GameSession {
    pub(crate) fn new(game: Game, seats: [Option<ClientHandle>; 2]) -> Self {
        Self {
            id: game.id(),
            usernames: Seat::BOTH.map(|s| game.player(s).username.clone()),
            bot_seat: game.bot_seat(),
            game: RwLock::new(game),
            seats: RwLock::new(seats),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    /// The username in `seat`. Fixed for the life of the game.
    pub fn username(&self, seat: Seat) -> &str {
        &self.usernames[seat.index()]
    }

    /// Which human seat `username` occupies, without touching the game
    /// lock. The bot seat never matches, so no connection can act for it.
    pub fn seat_of(&self, username: &str) -> Option<Seat> {
        Seat::BOTH.into_iter().find(|&s| {
            self.bot_seat != Some(s) && self.usernames[s.index()] == username
        })
    }

    pub fn bot_seat(&self) -> Option<Seat> {
        self.bot_seat
    }

    pub fn is_bot_game(&self) -> bool {
        self.bot_seat.is_some()
    }

    /// Shared access for queries.
    pub async fn game(&self) -> RwLockReadGuard<'_, Game> {
        self.game.read().await
    }

    /// Exclusive access for mutations.
    pub async fn game_mut(&self) -> RwLockWriteGuard<'_, Game> {
        self.game.write().await
    }

    /// The handle currently attached to `seat`.
    pub async fn handle(&self, seat: Seat) -> Option<ClientHandle> {
        self.seats.read().await[seat.index()].clone()
    }

    /// Queues `msg` for `seat` if someone is attached there.
    pub async fn send_to(&self, seat: Seat, msg: ServerMessage) -> bool {
        match &self.seats.read().await[seat.index()] {
            Some(handle) => handle.send(msg),
            None => false,
        }
    }

    /// Queues `msg` for every attached seat.
    pub async fn broadcast(&self, msg: ServerMessage) {
        for handle in self.seats.read().await.iter().flatten() {
            handle.send(msg.clone());
        }
    }

    pub(crate) async fn attach(&self, seat: Seat, handle: ClientHandle) {
        self.seats.write().await[seat.index()] = Some(handle);
    }

    /// Clears `seat` if it still belongs to `handle`'s connection.
    /// Returns `false` when a newer connection has taken the seat.
    pub(crate) async fn detach(&self, seat: Seat, handle: &ClientHandle) -> bool {
        let mut seats = self.seats.write().await;
        let taken = seats[seat.index()]
            .as_ref()
            .is_some_and(|current| current.conn_id() != handle.conn_id());
        if taken {
            return false;
        }
        seats[seat.index()] = None;
        true
    }
}

/// The `game_state` snapshot for the player in `seat`.
pub fn game_state_for(game: &Game, seat: Seat) -> ServerMessage {
    ServerMessage::GameState {
        game_id: game.id().to_string(),
        board: game.board().to_rows(),
        current_turn: game.current_turn().number(),
        your_color: seat.number(),
        your_turn: game.current_turn() == seat,
        opponent: game.opponent_of(seat).username.clone(),
    }
}
