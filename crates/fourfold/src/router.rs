//! Message routing: one inbound frame in, hub/queue/engine calls out.
//!
//! The router is shared by every connection task. It holds no per-
//! connection state; the caller passes in the [`ClientHandle`] the frame
//! arrived on.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use fourfold_engine::{Game, GameStatus, Outcome, Seat};
use fourfold_hub::{
    ClientHandle, ForfeitHook, GameSession, Hub, HubError, Registration,
};
use fourfold_matchmaking::{
    MatchCallback, MatchmakingQueue, Pairing, TimeoutCallback,
};
use fourfold_protocol::{
    ClientMessage, Codec, JsonCodec, ProtocolError, ServerMessage,
};

use crate::config::ServerConfig;
use crate::events::{EventSink, GameEvent};
use crate::store::PlayerStore;

// ---------------------------------------------------------------------------
// Result bookkeeping
// ---------------------------------------------------------------------------

/// Reports finished games to the stats store and the event sink.
///
/// Shared between the router and the hub's forfeit hook, so deadline
/// forfeits are recorded the same way as games that end on the board.
struct Recorder<S, E> {
    store: S,
    events: E,
}

impl<S: PlayerStore, E: EventSink> Recorder<S, E> {
    async fn publish(&self, event: GameEvent) {
        let name = event.name();
        if let Err(e) = self.events.publish(event).await {
            tracing::error!(event = name, error = %e, "failed to publish event");
        }
    }

    /// Stats for every human seat, then `game.ended`.
    async fn finished(&self, game: &Game) {
        for seat in Seat::BOTH {
            self.record_outcome(game, seat).await;
        }
        if let Some(event) = GameEvent::ended(game) {
            self.publish(event).await;
        }
    }

    async fn record_outcome(&self, game: &Game, seat: Seat) {
        let player = game.player(seat);
        if player.is_bot {
            return;
        }
        let Some(outcome) = game.outcome_for(seat) else {
            return;
        };

        let record = match self.store.create_or_get(&player.username).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(username = %player.username, error = %e, "failed to load player");
                return;
            }
        };

        let won = game.winner() == Some(seat);
        let updated = match outcome {
            Outcome::Draw => self.store.increment_draws(record.id).await,
            Outcome::Win => self.store.increment_wins(record.id).await,
            Outcome::Loss => self.store.increment_losses(record.id).await,
            Outcome::Forfeit if won => self.store.increment_wins(record.id).await,
            Outcome::Forfeit => self.store.increment_losses(record.id).await,
        };
        if let Err(e) = updated {
            tracing::error!(username = %player.username, %outcome, error = %e, "failed to record result");
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Translates client messages into queue, hub, and engine calls.
///
/// Cheap to clone; clones share the same hub, queue, and collaborators.
pub struct Router<S, E> {
    hub: Hub,
    queue: MatchmakingQueue,
    recorder: Arc<Recorder<S, E>>,
    codec: JsonCodec,
    bot_move_delay: Duration,
}

impl<S, E> Clone for Router<S, E> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            queue: self.queue.clone(),
            recorder: Arc::clone(&self.recorder),
            codec: self.codec,
            bot_move_delay: self.bot_move_delay,
        }
    }
}

impl<S: PlayerStore, E: EventSink> Router<S, E> {
    /// Starts the hub and the matchmaking queue and wires them together.
    pub fn spawn(config: &ServerConfig, store: S, events: E) -> Self {
        let recorder = Arc::new(Recorder { store, events });

        let on_forfeit = Arc::clone(&recorder);
        let hook: ForfeitHook = Arc::new(move |game: Game| {
            let recorder = Arc::clone(&on_forfeit);
            async move { recorder.finished(&game).await }.boxed()
        });

        Self {
            hub: Hub::spawn_with_forfeit_hook(config.hub.clone(), hook),
            queue: MatchmakingQueue::spawn(config.queue.clone()),
            recorder,
            codec: JsonCodec,
            bot_move_delay: config.bot_move_delay,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    /// Registers a new connection, resuming its game if it has one.
    pub async fn connect(&self, client: &ClientHandle) {
        match self.hub.register(client.clone()).await {
            Ok(Registration::Resumed(game_id)) => {
                if let Some(session) = self.hub.session(game_id).await {
                    self.resume_bot(&session).await;
                }
            }
            Ok(Registration::Fresh) => {}
            Err(e) => {
                tracing::error!(username = %client.username(), error = %e, "failed to register client");
            }
        }
    }

    /// Cleans up after a connection that went away.
    pub async fn disconnect(&self, client: &ClientHandle) {
        let username = client.username();

        // A newer connection for the same name may be the one queued.
        let current = self.hub.client(username).await;
        if current.is_none_or(|c| c.conn_id() == client.conn_id()) {
            if let Err(e) = self.queue.remove_player(username).await {
                tracing::warn!(%username, error = %e, "failed to leave queue");
            }
        }

        if let Err(e) = self.hub.unregister(client).await {
            tracing::warn!(%username, error = %e, "failed to unregister client");
        }
    }

    /// Decodes one inbound frame and dispatches it.
    pub async fn handle_frame(&self, client: &ClientHandle, frame: &[u8]) {
        match self.codec.decode_client(frame) {
            Ok(msg) => self.dispatch(client, msg).await,
            Err(e) => {
                tracing::debug!(username = %client.username(), error = %e, "rejected frame");
                client.send(ServerMessage::error(rejection_message(&e)));
            }
        }
    }

    /// Runs one decoded client message.
    pub async fn dispatch(&self, client: &ClientHandle, msg: ClientMessage) {
        tracing::debug!(username = %client.username(), kind = msg.kind(), "dispatching");
        match msg {
            ClientMessage::JoinQueue(_) => self.join_queue(client).await,
            ClientMessage::MakeMove(payload) => {
                // Negative columns become out-of-range and are refused by
                // the engine like any other bad column.
                let column =
                    usize::try_from(payload.column).unwrap_or(usize::MAX);
                self.make_move(client, column).await;
            }
            ClientMessage::LeaveGame => self.leave_game(client).await,
            ClientMessage::ResumeSession => self.resume_session(client).await,
            ClientMessage::AbandonSession => {
                self.abandon_session(client).await;
            }
        }
    }

    // -- join_queue ---------------------------------------------------------

    async fn join_queue(&self, client: &ClientHandle) {
        let username = client.username();
        if self.hub.has_active_game(username).await {
            client.send(ServerMessage::error("Already in a game"));
            return;
        }

        let (on_match, on_timeout) = self.queue_callbacks(username);
        let queued = self.queue.add_player(username, on_match, on_timeout).await;
        let position = match queued {
            Ok(()) => self.queue.position(username).await,
            Err(e) => Err(e),
        };
        match position {
            Ok(position) => {
                client.send(ServerMessage::QueueJoined { position });
                tracing::info!(%username, position, "player joined queue");
            }
            Err(e) => {
                tracing::error!(%username, error = %e, "matchmaking unavailable");
                client.send(ServerMessage::error("Matchmaking unavailable"));
            }
        }
    }

    /// What the queue calls back for `username`. Boxed here so a re-queue
    /// from inside [`on_match`](Self::on_match) names no recursive future.
    fn queue_callbacks(&self, username: &str) -> (MatchCallback, TimeoutCallback) {
        let me = username.to_string();
        let router = self.clone();
        let on_match: MatchCallback = Box::new(move |pairing: Pairing| {
            async move { router.on_match(&me, pairing).await }.boxed()
        });
        let router = self.clone();
        let on_timeout: TimeoutCallback = Box::new(move |name: String| {
            async move { router.start_bot_game(&name).await }.boxed()
        });
        (on_match, on_timeout)
    }

    /// Runs once per entrant of a pairing; only the first call creates
    /// the game. An entrant whose partner vanished goes back in line.
    async fn on_match(&self, me: &str, pairing: Pairing) {
        let created = self
            .hub
            .create_game(&pairing.seat_one, Some(&pairing.seat_two))
            .await;
        match created {
            Ok(session) => self.announce_start(&session).await,
            Err(HubError::AlreadyInGame(_)) => {}
            Err(HubError::NotConnected(missing)) => {
                tracing::warn!(username = %missing, "matched opponent not found");
                if missing != me {
                    if let Some(client) = self.hub.client(me).await {
                        self.join_queue(&client).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!(seat_one = %pairing.seat_one, seat_two = %pairing.seat_two, error = %e, "failed to start game");
            }
        }
    }

    async fn start_bot_game(&self, username: &str) {
        match self.hub.create_game(username, None).await {
            Ok(session) => self.announce_start(&session).await,
            Err(e) => {
                tracing::warn!(%username, error = %e, "could not start bot game");
            }
        }
    }

    /// Sends `game_started` to each human seat and publishes the event.
    async fn announce_start(&self, session: &GameSession) {
        let event = {
            let game = session.game().await;
            for seat in Seat::BOTH {
                session
                    .send_to(
                        seat,
                        ServerMessage::GameStarted {
                            game_id: game.id().to_string(),
                            opponent: game.opponent_of(seat).username.clone(),
                            your_turn: game.current_turn() == seat,
                            your_color: seat.number(),
                        },
                    )
                    .await;
            }
            GameEvent::started(&game)
        };

        tracing::info!(
            game_id = %session.id(),
            seat_one = session.username(Seat::One),
            seat_two = session.username(Seat::Two),
            bot = session.is_bot_game(),
            "game started"
        );
        self.recorder.publish(event).await;
    }

    // -- make_move ----------------------------------------------------------

    async fn make_move(&self, client: &ClientHandle, column: usize) {
        let username = client.username();
        let Some(session) = self.hub.active_session(username).await else {
            client.send(ServerMessage::error("Not in a game"));
            return;
        };
        let Some(seat) = session.seat_of(username) else {
            client.send(ServerMessage::error("Not in a game"));
            return;
        };

        let applied = {
            let mut game = session.game_mut().await;
            match game.make_move(seat, column) {
                Ok(row) => {
                    // Broadcast under the game lock so both seats see moves
                    // in the order they were applied.
                    session.broadcast(move_made(&game, seat, column, row)).await;
                    Ok((
                        game.is_finished(),
                        session.bot_seat() == Some(game.current_turn()),
                        GameEvent::latest_move(&game),
                    ))
                }
                Err(e) => Err(e),
            }
        };

        let (finished, bot_to_move, event) = match applied {
            Ok(applied) => applied,
            Err(reason) => {
                tracing::debug!(%username, column, %reason, "move rejected");
                client.send(ServerMessage::InvalidMove {
                    reason: reason.to_string(),
                });
                return;
            }
        };

        if let Some(event) = event {
            self.recorder.publish(event).await;
        }
        if finished {
            self.finish(&session).await;
        } else if bot_to_move {
            self.schedule_bot_move(session);
        }
    }

    /// Plays the bot's reply after the configured delay.
    fn schedule_bot_move(&self, session: Arc<GameSession>) {
        let router = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(router.bot_move_delay).await;
            router.play_bot_move(&session).await;
        });
    }

    /// Re-checks the game, lets the bot pick a column, and applies it.
    async fn play_bot_move(&self, session: &GameSession) {
        let Some(bot) = session.bot_seat() else {
            return;
        };

        let (finished, event) = {
            let mut game = session.game_mut().await;
            if game.status() != GameStatus::InProgress
                || game.current_turn() != bot
            {
                tracing::debug!(game_id = %session.id(), "bot turn no longer applies");
                return;
            }

            let Some(column) = fourfold_bot::select_move(game.board(), bot)
            else {
                tracing::error!(game_id = %session.id(), "bot found no legal column");
                return;
            };
            let row = match game.make_move(bot, column) {
                Ok(row) => row,
                Err(e) => {
                    tracing::error!(game_id = %session.id(), column, error = %e, "bot made invalid move");
                    return;
                }
            };

            session.broadcast(move_made(&game, bot, column, row)).await;
            (game.is_finished(), GameEvent::latest_move(&game))
        };

        if let Some(event) = event {
            self.recorder.publish(event).await;
        }
        if finished {
            self.finish(session).await;
        }
    }

    /// A paused bot game that comes back on the bot's turn needs its move.
    async fn resume_bot(&self, session: &Arc<GameSession>) {
        let Some(bot) = session.bot_seat() else {
            return;
        };
        let waiting_on_bot = {
            let game = session.game().await;
            game.status() == GameStatus::InProgress && game.current_turn() == bot
        };
        if waiting_on_bot {
            self.schedule_bot_move(Arc::clone(session));
        }
    }

    // -- leave / resume / abandon -------------------------------------------

    async fn leave_game(&self, client: &ClientHandle) {
        let username = client.username();
        let Some(session) = self.hub.active_session(username).await else {
            tracing::debug!(%username, "leave_game without a game");
            return;
        };
        let Some(seat) = session.seat_of(username) else {
            return;
        };

        let forfeited = session.game_mut().await.forfeit(seat).is_ok();
        if forfeited {
            tracing::info!(%username, game_id = %session.id(), "player left game");
            self.finish(&session).await;
        }
    }

    async fn resume_session(&self, client: &ClientHandle) {
        match self.hub.resume(client).await {
            Ok(game_id) => {
                if let Some(session) = self.hub.session(game_id).await {
                    self.resume_bot(&session).await;
                }
            }
            Err(e) => {
                client.send(ServerMessage::error(e.to_string()));
            }
        }
    }

    async fn abandon_session(&self, client: &ClientHandle) {
        if let Some(game) = self.hub.abandon(client.username()).await {
            self.recorder.finished(&game).await;
        }
    }

    // -- game over ----------------------------------------------------------

    /// Announces a finished game to each seat, frees both players, and
    /// records the result.
    async fn finish(&self, session: &GameSession) {
        let game = session.game().await.clone();
        if !game.is_finished() {
            return;
        }

        let winner = game.winner_name().to_string();
        let final_board = game.board().to_rows();
        for seat in Seat::BOTH {
            let Some(outcome) = game.outcome_for(seat) else {
                continue;
            };
            session
                .send_to(
                    seat,
                    ServerMessage::GameOver {
                        winner: winner.clone(),
                        result: outcome.as_str().to_string(),
                        final_board: final_board.clone(),
                    },
                )
                .await;
        }

        tracing::info!(
            game_id = %game.id(),
            %winner,
            result = ?game.result(),
            moves = game.moves().len(),
            "game over"
        );

        self.hub.remove_session(game.id()).await;
        self.recorder.finished(&game).await;
    }
}

fn move_made(game: &Game, seat: Seat, column: usize, row: usize) -> ServerMessage {
    ServerMessage::MoveMade {
        column,
        row,
        player: seat.number(),
        board: game.board().to_rows(),
    }
}

/// What the client is told when a frame can't be decoded.
fn rejection_message(err: &ProtocolError) -> &'static str {
    match err {
        ProtocolError::UnknownType(_) => "Unknown message type",
        ProtocolError::InvalidPayload { kind, .. }
            if *kind == ClientMessage::MAKE_MOVE =>
        {
            "Invalid move payload"
        }
        _ => "Invalid message format",
    }
}
