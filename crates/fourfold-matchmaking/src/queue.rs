//! The queue actor and its handle.

use std::collections::VecDeque;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{QueueConfig, QueueError};

/// Two players matched by the queue.
///
/// `seat_one` waited longer and moves first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub seat_one: String,
    pub seat_two: String,
}

impl Pairing {
    /// The other half of the pairing, from `username`'s point of view.
    pub fn opponent_of(&self, username: &str) -> &str {
        if self.seat_one == username {
            &self.seat_two
        } else {
            &self.seat_one
        }
    }
}

/// Called (on its own task) when an entrant is paired.
pub type MatchCallback = Box<dyn FnOnce(Pairing) -> BoxFuture<'static, ()> + Send>;

/// Called (on its own task) when an entrant waited too long.
pub type TimeoutCallback = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

/// One waiting player.
struct QueueEntry {
    username: String,
    joined_at: Instant,
    on_match: MatchCallback,
    on_timeout: TimeoutCallback,
}

/// Commands sent to the queue actor through its channel.
enum QueueCommand {
    Add(QueueEntry),
    Remove(String),
    Position {
        username: String,
        reply: oneshot::Sender<usize>,
    },
    Size {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running matchmaking actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Commands are
/// processed strictly in the order they're sent, so a `position` query
/// issued right after `add_player` sees the add.
#[derive(Clone)]
pub struct MatchmakingQueue {
    sender: mpsc::Sender<QueueCommand>,
}

impl MatchmakingQueue {
    /// Spawns the queue actor and returns a handle to it.
    pub fn spawn(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_size.max(1));
        let actor = QueueActor {
            waiting: VecDeque::new(),
            config,
            receiver: rx,
        };
        tokio::spawn(actor.run());
        Self { sender: tx }
    }

    /// Puts `username` in line.
    ///
    /// If someone is already waiting, the two are paired right away and
    /// both entrants' `on_match` run with the same [`Pairing`]. A username
    /// that's already queued is left where it is and these callbacks are
    /// dropped.
    pub async fn add_player<M, MF, T, TF>(
        &self,
        username: impl Into<String>,
        on_match: M,
        on_timeout: T,
    ) -> Result<(), QueueError>
    where
        M: FnOnce(Pairing) -> MF + Send + 'static,
        MF: Future<Output = ()> + Send + 'static,
        T: FnOnce(String) -> TF + Send + 'static,
        TF: Future<Output = ()> + Send + 'static,
    {
        let entry = QueueEntry {
            username: username.into(),
            joined_at: Instant::now(),
            on_match: Box::new(move |pairing| on_match(pairing).boxed()),
            on_timeout: Box::new(move |name| on_timeout(name).boxed()),
        };
        self.send(QueueCommand::Add(entry)).await
    }

    /// Takes `username` out of line. Unknown names are ignored.
    pub async fn remove_player(
        &self,
        username: impl Into<String>,
    ) -> Result<(), QueueError> {
        self.send(QueueCommand::Remove(username.into())).await
    }

    /// 1-based position of `username`, or 0 if not waiting.
    ///
    /// Only a snapshot: the next add or sweep can change it.
    pub async fn position(
        &self,
        username: impl Into<String>,
    ) -> Result<usize, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueueCommand::Position {
            username: username.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| QueueError::Unavailable)
    }

    /// Number of players currently waiting.
    pub async fn size(&self) -> Result<usize, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueueCommand::Size { reply }).await?;
        rx.await.map_err(|_| QueueError::Unavailable)
    }

    /// Stops the actor. Waiting players get no callback.
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.send(QueueCommand::Shutdown).await
    }

    async fn send(&self, cmd: QueueCommand) -> Result<(), QueueError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| QueueError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct QueueActor {
    waiting: VecDeque<QueueEntry>,
    config: QueueConfig,
    receiver: mpsc::Receiver<QueueCommand>,
}

impl QueueActor {
    async fn run(mut self) {
        tracing::info!(
            timeout_secs = self.config.match_timeout.as_secs(),
            "matchmaking queue started"
        );

        let mut sweep = time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(QueueCommand::Add(entry)) => self.handle_add(entry),
                    Some(QueueCommand::Remove(username)) => {
                        self.handle_remove(&username);
                    }
                    Some(QueueCommand::Position { username, reply }) => {
                        let _ = reply.send(self.position(&username));
                    }
                    Some(QueueCommand::Size { reply }) => {
                        let _ = reply.send(self.waiting.len());
                    }
                    Some(QueueCommand::Shutdown) | None => break,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }

        tracing::info!(
            dropped = self.waiting.len(),
            "matchmaking queue stopped"
        );
    }

    fn handle_add(&mut self, entry: QueueEntry) {
        if self.waiting.iter().any(|e| e.username == entry.username) {
            tracing::warn!(username = %entry.username, "player already in queue");
            return;
        }

        let Some(waiting) = self.waiting.pop_front() else {
            tracing::info!(
                username = %entry.username,
                queue_size = self.waiting.len() + 1,
                "player added to queue"
            );
            self.waiting.push_back(entry);
            return;
        };

        let pairing = Pairing {
            seat_one: waiting.username,
            seat_two: entry.username,
        };
        tracing::info!(
            seat_one = %pairing.seat_one,
            seat_two = %pairing.seat_two,
            "players matched"
        );
        tokio::spawn((waiting.on_match)(pairing.clone()));
        tokio::spawn((entry.on_match)(pairing));
    }

    fn handle_remove(&mut self, username: &str) {
        if let Some(index) =
            self.waiting.iter().position(|e| e.username == username)
        {
            self.waiting.remove(index);
            tracing::info!(%username, "player removed from queue");
        }
    }

    fn position(&self, username: &str) -> usize {
        self.waiting
            .iter()
            .position(|e| e.username == username)
            .map_or(0, |i| i + 1)
    }

    /// Evicts everyone who has waited at least `match_timeout`.
    fn sweep(&mut self) {
        let now = Instant::now();
        let timeout = self.config.match_timeout;

        let (expired, remaining): (VecDeque<_>, VecDeque<_>) = self
            .waiting
            .drain(..)
            .partition(|e| now.duration_since(e.joined_at) >= timeout);
        self.waiting = remaining;

        for entry in expired {
            tracing::info!(
                username = %entry.username,
                "matchmaking timeout, assigning bot"
            );
            tokio::spawn((entry.on_timeout)(entry.username));
        }
    }
}
