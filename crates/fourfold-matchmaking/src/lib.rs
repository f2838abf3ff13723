//! Matchmaking for Fourfold.
//!
//! The queue runs as a single Tokio task (actor model) that owns the
//! waiting list. Every mutation, including the periodic timeout sweep,
//! goes through that one task, so there is never more than one writer.
//!
//! # Key types
//!
//! - [`MatchmakingQueue`]: cheap, cloneable handle to the running actor
//! - [`Pairing`]: who got matched, in seat order
//! - [`QueueConfig`]: wait timeout and sweep interval
//!
//! # Flow
//!
//! ```text
//! add_player(alice) ──► [alice]               queue_joined { position: 1 }
//! add_player(bob)   ──► []  on_match(alice, bob) for both entrants
//!
//! add_player(carol) ──► [carol]
//!   ... 10 s pass ...
//! sweep             ──► []  on_timeout(carol)  → bot game
//! ```

mod config;
mod error;
mod queue;

pub use config::QueueConfig;
pub use error::QueueError;
pub use queue::{MatchCallback, MatchmakingQueue, Pairing, TimeoutCallback};
