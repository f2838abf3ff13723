//! # Fourfold
//!
//! Real-time Connect Four session server.
//!
//! Players connect over WebSocket with `?username=<name>`, queue for a
//! match, and play. Anyone left waiting past the matchmaking timeout gets
//! the bot instead. A player who drops mid-game has a grace period to
//! reconnect before the game is forfeited.
//!
//! ## Layers
//!
//! ```text
//! fourfold-transport   WebSocket accept, username handshake, frames
//! fourfold-protocol    envelopes, message kinds, JSON codec
//! fourfold (this)      router, per-connection tasks, server loop
//!   ├─ fourfold-matchmaking   FIFO queue actor
//!   ├─ fourfold-hub           clients, sessions, reconnect deadlines
//!   ├─ fourfold-engine        board, rules, game state machine
//!   └─ fourfold-bot           one-ply heuristic opponent
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fourfold::prelude::*;
//!
//! # async fn start() -> Result<(), FourfoldError> {
//! let server = FourfoldServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Statistics and analytics are pluggable through [`PlayerStore`] and
//! [`EventSink`].

mod config;
mod error;
mod events;
mod handler;
mod router;
mod server;
mod store;

pub use config::{ConnectionConfig, ServerConfig};
pub use error::FourfoldError;
pub use events::{EventError, EventKind, EventSink, GameEvent, LogEventSink};
pub use router::Router;
pub use server::{FourfoldServer, FourfoldServerBuilder};
pub use store::{MemoryPlayerStore, PlayerRecord, PlayerStore, StoreError};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{
        ConnectionConfig, EventSink, FourfoldError, FourfoldServer,
        FourfoldServerBuilder, GameEvent, LogEventSink, MemoryPlayerStore,
        PlayerRecord, PlayerStore, ServerConfig,
    };
    pub use fourfold_hub::HubConfig;
    pub use fourfold_matchmaking::QueueConfig;
}
