//! The hub handle, its registration loop, and reconnection deadlines.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use fourfold_engine::{Game, GameId, GameStatus, PlayerInfo, Seat};
use fourfold_protocol::ServerMessage;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::session::game_state_for;
use crate::{ClientHandle, GameSession, HubConfig, HubError};

/// Called with the final game whenever a reconnection deadline forfeits
/// a game, so results can be recorded.
pub type ForfeitHook = Arc<dyn Fn(Game) -> BoxFuture<'static, ()> + Send + Sync>;

/// What happened when a connection registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// No unfinished game; the player starts in the lobby.
    Fresh,
    /// The player was put straight back into this game.
    Resumed(GameId),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    clients: HashMap<String, ClientHandle>,
    sessions: HashMap<GameId, Arc<GameSession>>,
    player_games: HashMap<String, GameId>,
}

impl Registry {
    /// The session `username` is indexed to, if it still exists.
    fn session_for(&self, username: &str) -> Option<Arc<GameSession>> {
        let id = self.player_games.get(username)?;
        self.sessions.get(id).cloned()
    }

    /// Drops a session and every index entry that still points at it.
    fn remove_session(&mut self, id: GameId) -> Option<Arc<GameSession>> {
        let session = self.sessions.remove(&id)?;
        for seat in Seat::BOTH {
            let username = session.username(seat);
            if self.player_games.get(username) == Some(&id) {
                self.player_games.remove(username);
            }
        }
        Some(session)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum HubCommand {
    Register {
        client: ClientHandle,
        reply: oneshot::Sender<Registration>,
    },
    Unregister {
        client: ClientHandle,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Handle to the connection hub. Cheap to clone.
///
/// Construct one per process and pass it to whoever needs it.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<RwLock<Registry>>,
    config: Arc<HubConfig>,
    commands: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Starts the hub's registration loop.
    pub fn spawn(config: HubConfig) -> Self {
        Self::start(config, None)
    }

    /// Like [`spawn`](Self::spawn), with a callback for deadline forfeits.
    pub fn spawn_with_forfeit_hook(config: HubConfig, hook: ForfeitHook) -> Self {
        Self::start(config, Some(hook))
    }

    fn start(config: HubConfig, forfeit_hook: Option<ForfeitHook>) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_size.max(1));
        let registry = Arc::new(RwLock::new(Registry::default()));
        let config = Arc::new(config);

        let event_loop = HubLoop {
            registry: Arc::clone(&registry),
            config: Arc::clone(&config),
            forfeit_hook,
            receiver: rx,
        };
        tokio::spawn(event_loop.run());

        Self {
            registry,
            config,
            commands: tx,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Registers a new connection.
    ///
    /// If the username has an unfinished game, this is a reconnection:
    /// the seat is re-attached, the client gets a `game_state` snapshot,
    /// and the opponent hears `opponent_reconnected`.
    pub async fn register(
        &self,
        client: ClientHandle,
    ) -> Result<Registration, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Register { client, reply }).await?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Unregisters a connection that went away.
    ///
    /// Ignored if the username has since been taken over by a newer
    /// connection. Otherwise, if the player is mid-game, the game is
    /// paused, the opponent is told, and a deadline starts.
    pub async fn unregister(&self, client: &ClientHandle) -> Result<(), HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Unregister {
            client: client.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Stops the registration loop. Queries keep working.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubCommand::Shutdown).await
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| HubError::Unavailable)
    }

    /// Creates a game and indexes both players to it.
    ///
    /// `seat_two = None` puts the bot in the second seat. Both humans
    /// must be registered.
    ///
    /// # Errors
    /// - `AlreadyInGame` if either human has an unfinished game. A pairing
    ///   reported to both entrants therefore creates exactly one game.
    /// - `NotConnected` if a human isn't registered.
    pub async fn create_game(
        &self,
        seat_one: &str,
        seat_two: Option<&str>,
    ) -> Result<Arc<GameSession>, HubError> {
        let mut reg = self.registry.write().await;

        for username in std::iter::once(seat_one).chain(seat_two) {
            if let Some(existing) = reg.session_for(username) {
                if !existing.game().await.is_finished() {
                    return Err(HubError::AlreadyInGame(username.to_string()));
                }
            }
        }

        let handle_for = |username: &str| {
            reg.clients
                .get(username)
                .cloned()
                .ok_or_else(|| HubError::NotConnected(username.to_string()))
        };
        let first = handle_for(seat_one)?;
        let second = seat_two.map(handle_for).transpose()?;

        let game = Game::new(
            PlayerInfo::human(seat_one),
            match seat_two {
                Some(username) => PlayerInfo::human(username),
                None => PlayerInfo::bot(&self.config.bot_name),
            },
        );
        let id = game.id();
        let session = Arc::new(GameSession::new(game, [Some(first), second]));

        for username in std::iter::once(seat_one).chain(seat_two) {
            if let Some(old) = reg.player_games.insert(username.to_string(), id) {
                // Only finished games can be left behind here.
                reg.remove_session(old);
            }
        }
        reg.sessions.insert(id, Arc::clone(&session));

        tracing::info!(
            game_id = %id,
            seat_one,
            seat_two = session.username(Seat::Two),
            bot = session.is_bot_game(),
            "game created"
        );
        Ok(session)
    }

    /// The live handle registered under `username`.
    pub async fn client(&self, username: &str) -> Option<ClientHandle> {
        self.registry.read().await.clients.get(username).cloned()
    }

    pub async fn session(&self, id: GameId) -> Option<Arc<GameSession>> {
        self.registry.read().await.sessions.get(&id).cloned()
    }

    /// Scans the sessions for an unfinished game `username` is seated in.
    pub async fn active_session(&self, username: &str) -> Option<Arc<GameSession>> {
        let candidates: Vec<Arc<GameSession>> = self
            .registry
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.seat_of(username).is_some())
            .cloned()
            .collect();

        for session in candidates {
            if !session.game().await.is_finished() {
                return Some(session);
            }
        }
        None
    }

    /// `true` if `username` is indexed to an unfinished game.
    pub async fn has_active_game(&self, username: &str) -> bool {
        let session = self.registry.read().await.session_for(username);
        match session {
            Some(session) => !session.game().await.is_finished(),
            None => false,
        }
    }

    /// The game id `username` is indexed to, finished or not.
    pub async fn tracked_game(&self, username: &str) -> Option<GameId> {
        self.registry.read().await.player_games.get(username).copied()
    }

    /// Re-attaches `client` to the game its username is tracked in.
    ///
    /// # Errors
    /// `NoSession` if nothing is tracked; `SessionGone` if the tracked
    /// game was already torn down (the stale index entry is dropped).
    pub async fn resume(&self, client: &ClientHandle) -> Result<GameId, HubError> {
        let mut reg = self.registry.write().await;
        let username = client.username();

        let id = *reg.player_games.get(username).ok_or(HubError::NoSession)?;
        let Some(session) = reg.sessions.get(&id).cloned() else {
            reg.player_games.remove(username);
            return Err(HubError::SessionGone);
        };

        reattach(&session, client).await;
        tracing::info!(%username, game_id = %id, "session resumed");
        Ok(id)
    }

    /// Gives up `username`'s tracked game and tears the session down.
    ///
    /// The opponent, if attached, gets `game_forfeited`. Returns the final
    /// game when this call is what ended it.
    pub async fn abandon(&self, username: &str) -> Option<Game> {
        let mut reg = self.registry.write().await;

        let Some(&id) = reg.player_games.get(username) else {
            tracing::info!(%username, "no session to abandon");
            return None;
        };
        let Some(session) = reg.remove_session(id) else {
            reg.player_games.remove(username);
            return None;
        };
        let seat = session.seat_of(username)?;

        let ended = {
            let mut game = session.game_mut().await;
            game.forfeit(seat).ok().map(|()| game.clone())
        };

        let winner = session.username(seat.opponent()).to_string();
        session
            .send_to(seat.opponent(), ServerMessage::GameForfeited { winner })
            .await;

        tracing::info!(%username, game_id = %id, "session abandoned");
        ended
    }

    /// Removes a session from every registry. Used once a finished game
    /// has been announced.
    pub async fn remove_session(&self, id: GameId) -> Option<Arc<GameSession>> {
        let removed = self.registry.write().await.remove_session(id);
        if removed.is_some() {
            tracing::debug!(game_id = %id, "session removed");
        }
        removed
    }

    pub async fn client_count(&self) -> usize {
        self.registry.read().await.clients.len()
    }

    pub async fn session_count(&self) -> usize {
        self.registry.read().await.sessions.len()
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Single writer for registration changes.
struct HubLoop {
    registry: Arc<RwLock<Registry>>,
    config: Arc<HubConfig>,
    forfeit_hook: Option<ForfeitHook>,
    receiver: mpsc::Receiver<HubCommand>,
}

impl HubLoop {
    async fn run(mut self) {
        tracing::info!("connection hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register { client, reply } => {
                    let outcome = self.handle_register(client).await;
                    let _ = reply.send(outcome);
                }
                HubCommand::Unregister { client, reply } => {
                    self.handle_unregister(client).await;
                    let _ = reply.send(());
                }
                HubCommand::Shutdown => break,
            }
        }

        tracing::info!("connection hub stopped");
    }

    async fn handle_register(&self, client: ClientHandle) -> Registration {
        let mut reg = self.registry.write().await;
        let username = client.username().to_string();

        if let Some(previous) = reg.clients.insert(username.clone(), client.clone()) {
            tracing::debug!(
                %username,
                old = %previous.conn_id(),
                new = %client.conn_id(),
                "connection replaced"
            );
        }

        let Some(session) = reg.session_for(&username) else {
            tracing::info!(%username, conn_id = %client.conn_id(), "client registered");
            return Registration::Fresh;
        };
        if session.game().await.is_finished() {
            tracing::info!(%username, conn_id = %client.conn_id(), "client registered");
            return Registration::Fresh;
        }

        reattach(&session, &client).await;
        tracing::info!(%username, game_id = %session.id(), "player reconnected");
        Registration::Resumed(session.id())
    }

    async fn handle_unregister(&self, client: ClientHandle) {
        let mut reg = self.registry.write().await;
        let username = client.username();

        match reg.clients.get(username) {
            Some(current) if current.conn_id() == client.conn_id() => {
                reg.clients.remove(username);
            }
            _ => {
                tracing::debug!(%username, conn_id = %client.conn_id(), "stale unregister ignored");
                return;
            }
        }
        tracing::info!(%username, conn_id = %client.conn_id(), "client unregistered");

        let Some(session) = reg.session_for(username) else {
            return;
        };
        let Some(seat) = session.seat_of(username) else {
            return;
        };
        if !session.detach(seat, &client).await {
            return;
        }

        let generation = {
            let mut game = session.game_mut().await;
            if game.is_finished() {
                return;
            }
            game.set_disconnected(seat);
            game.player(seat).disconnects
        };
        drop(reg);

        let timeout = self.config.reconnect_timeout;
        session
            .send_to(
                seat.opponent(),
                ServerMessage::OpponentDisconnected {
                    timeout_seconds: timeout.as_secs(),
                },
            )
            .await;

        tracing::info!(
            %username,
            game_id = %session.id(),
            timeout_secs = timeout.as_secs(),
            "player disconnected from game"
        );

        let deadline = Deadline {
            registry: Arc::clone(&self.registry),
            forfeit_hook: self.forfeit_hook.clone(),
            game_id: session.id(),
            seat,
            generation,
        };
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.fire().await;
        });
    }
}

/// Puts `client` back into `session`: attaches the seat, resumes play if
/// possible, and sends the snapshot and the opponent notice.
async fn reattach(session: &GameSession, client: &ClientHandle) {
    let Some(seat) = session.seat_of(client.username()) else {
        return;
    };

    let (snapshot, was_away) = {
        let mut game = session.game_mut().await;
        let was_away = !game.player(seat).connected;
        game.set_reconnected(seat);
        (game_state_for(&game, seat), was_away)
    };

    session.attach(seat, client.clone()).await;
    client.send(snapshot);
    if was_away {
        session
            .send_to(seat.opponent(), ServerMessage::OpponentReconnected {})
            .await;
    }
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// A pending forfeit for one specific disconnect.
///
/// `generation` is the seat's disconnect count when this deadline was
/// set. If the player came back (and maybe dropped again) in the
/// meantime, the counts no longer match and firing does nothing.
struct Deadline {
    registry: Arc<RwLock<Registry>>,
    forfeit_hook: Option<ForfeitHook>,
    game_id: GameId,
    seat: Seat,
    generation: u64,
}

impl Deadline {
    async fn fire(self) {
        let mut reg = self.registry.write().await;
        let Some(session) = reg.sessions.get(&self.game_id).cloned() else {
            return;
        };

        let ended = {
            let mut game = session.game_mut().await;
            let same_disconnect = game.status() == GameStatus::Disconnected
                && !game.player(self.seat).connected
                && game.player(self.seat).disconnects == self.generation;
            if !same_disconnect {
                tracing::debug!(game_id = %self.game_id, "deadline no longer applies");
                return;
            }
            if game.forfeit(self.seat).is_err() {
                return;
            }
            game.clone()
        };

        let winner = session.username(self.seat.opponent()).to_string();
        session
            .send_to(self.seat.opponent(), ServerMessage::GameForfeited { winner })
            .await;
        reg.remove_session(self.game_id);
        drop(reg);

        tracing::info!(
            game_id = %self.game_id,
            loser = session.username(self.seat),
            "game forfeited after reconnect timeout"
        );

        if let Some(hook) = self.forfeit_hook {
            hook(ended).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourfold_transport::ConnectionId;

    fn session(one: &str, two: &str) -> Arc<GameSession> {
        let game = Game::new(PlayerInfo::human(one), PlayerInfo::human(two));
        Arc::new(GameSession::new(game, [None, None]))
    }

    #[test]
    fn test_remove_session_keeps_newer_mappings() {
        let mut reg = Registry::default();
        let old = session("alice", "bob");
        let newer = session("bob", "carol");

        reg.sessions.insert(old.id(), Arc::clone(&old));
        reg.sessions.insert(newer.id(), Arc::clone(&newer));
        reg.player_games.insert("alice".into(), old.id());
        reg.player_games.insert("bob".into(), newer.id());
        reg.player_games.insert("carol".into(), newer.id());

        assert!(reg.remove_session(old.id()).is_some());

        assert!(!reg.player_games.contains_key("alice"));
        assert_eq!(reg.player_games.get("bob"), Some(&newer.id()));
        assert!(reg.remove_session(old.id()).is_none());
    }

    #[tokio::test]
    async fn test_reattach_notifies_only_after_real_disconnect() {
        let s = session("alice", "bob");
        let (alice, mut alice_rx) = ClientHandle::new("alice", ConnectionId::new(1), 8);
        let (bob, mut bob_rx) = ClientHandle::new("bob", ConnectionId::new(2), 8);
        s.attach(Seat::Two, bob).await;

        // Never marked away: snapshot only.
        reattach(&s, &alice).await;
        assert!(matches!(alice_rx.try_recv(), Ok(ServerMessage::GameState { .. })));
        assert!(bob_rx.try_recv().is_err());

        s.game_mut().await.set_disconnected(Seat::One);
        reattach(&s, &alice).await;
        assert!(matches!(alice_rx.try_recv(), Ok(ServerMessage::GameState { .. })));
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::OpponentReconnected {});
        assert_eq!(s.game().await.status(), GameStatus::InProgress);
    }

    fn deadline(reg: &Arc<RwLock<Registry>>, s: &GameSession, generation: u64) -> Deadline {
        Deadline {
            registry: Arc::clone(reg),
            forfeit_hook: None,
            game_id: s.id(),
            seat: Seat::One,
            generation,
        }
    }

    #[tokio::test]
    async fn test_deadline_fire_stale_generation_is_ignored() {
        let s = session("alice", "bob");
        let reg = Arc::new(RwLock::new(Registry::default()));
        reg.write().await.sessions.insert(s.id(), Arc::clone(&s));

        // Dropped, back, dropped again: only the second deadline counts.
        {
            let mut game = s.game_mut().await;
            game.set_disconnected(Seat::One);
            game.set_reconnected(Seat::One);
            game.set_disconnected(Seat::One);
        }

        deadline(&reg, &s, 1).fire().await;
        assert_eq!(s.game().await.status(), GameStatus::Disconnected);
        assert!(reg.read().await.sessions.contains_key(&s.id()));

        deadline(&reg, &s, 2).fire().await;
        assert_eq!(s.game().await.winner(), Some(Seat::Two));
        assert!(reg.read().await.sessions.is_empty());
    }
}
