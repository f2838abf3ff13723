//! Player statistics hook.
//!
//! Fourfold doesn't own a database. After every finished game the router
//! records wins, losses, and draws through a [`PlayerStore`]; plug in
//! whatever storage you use. [`MemoryPlayerStore`] keeps everything in
//! process and is what the bundled binary and the tests use.
//!
//! Store failures are logged by the caller and never reach players.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A player's persistent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub created_at: DateTime<Utc>,
}

impl PlayerRecord {
    fn new(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            wins: 0,
            losses: 0,
            draws: 0,
            created_at: Utc::now(),
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// Errors a [`PlayerStore`] can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("player {0} not found")]
    NotFound(Uuid),

    /// The backing store failed.
    #[error("player store unavailable: {0}")]
    Unavailable(String),
}

/// Where per-player results are kept.
///
/// `Send + Sync + 'static` because one store is shared by every game for
/// the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use fourfold::{PlayerRecord, PlayerStore, StoreError};
/// use uuid::Uuid;
///
/// /// Drops everything on the floor.
/// struct NullStore;
///
/// impl PlayerStore for NullStore {
///     async fn create_or_get(&self, username: &str) -> Result<PlayerRecord, StoreError> {
///         Err(StoreError::Unavailable(format!("can't store {username}")))
///     }
///     async fn increment_wins(&self, _id: Uuid) -> Result<(), StoreError> { Ok(()) }
///     async fn increment_losses(&self, _id: Uuid) -> Result<(), StoreError> { Ok(()) }
///     async fn increment_draws(&self, _id: Uuid) -> Result<(), StoreError> { Ok(()) }
/// }
/// ```
pub trait PlayerStore: Send + Sync + 'static {
    /// Returns the record for `username`, creating it on first sight.
    fn create_or_get(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<PlayerRecord, StoreError>> + Send;

    fn increment_wins(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn increment_losses(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn increment_draws(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-process [`PlayerStore`]. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryPlayerStore {
    players: Mutex<HashMap<String, PlayerRecord>>,
}

impl MemoryPlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for `username`, if one was ever created.
    pub async fn get(&self, username: &str) -> Option<PlayerRecord> {
        self.players.lock().await.get(username).cloned()
    }

    /// All records, best first: most wins, then fewest losses, then name.
    pub async fn leaderboard(&self) -> Vec<PlayerRecord> {
        let mut records: Vec<_> =
            self.players.lock().await.values().cloned().collect();
        records.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then(a.losses.cmp(&b.losses))
                .then_with(|| a.username.cmp(&b.username))
        });
        records
    }

    async fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut PlayerRecord),
    ) -> Result<(), StoreError> {
        let mut players = self.players.lock().await;
        let record = players
            .values_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;
        apply(record);
        Ok(())
    }
}

impl PlayerStore for MemoryPlayerStore {
    async fn create_or_get(
        &self,
        username: &str,
    ) -> Result<PlayerRecord, StoreError> {
        let mut players = self.players.lock().await;
        let record = players
            .entry(username.to_string())
            .or_insert_with(|| PlayerRecord::new(username));
        Ok(record.clone())
    }

    async fn increment_wins(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |p| p.wins += 1).await
    }

    async fn increment_losses(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |p| p.losses += 1).await
    }

    async fn increment_draws(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |p| p.draws += 1).await
    }
}

/// Lets a caller keep a handle on the store it hands to the server.
impl<T: PlayerStore> PlayerStore for Arc<T> {
    fn create_or_get(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<PlayerRecord, StoreError>> + Send {
        (**self).create_or_get(username)
    }

    fn increment_wins(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).increment_wins(id)
    }

    fn increment_losses(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).increment_losses(id)
    }

    fn increment_draws(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).increment_draws(id)
    }
}
