//! Connection hub for Fourfold.
//!
//! The hub is the one place that knows which players are online and
//! which games they're in. It owns three registries:
//!
//! - **clients**: username → live [`ClientHandle`]
//! - **sessions**: game id → [`GameSession`]
//! - **player games**: username → game id
//!
//! Registration and unregistration are serialized through a single
//! event-loop task; everything else reads or writes the registries under
//! a shared `RwLock`.
//!
//! # Disconnects and deadlines
//!
//! ```text
//!  connection lost ──► set_disconnected ──► opponent_disconnected { 30 }
//!                                 │
//!                  ┌──────────────┴──────────────┐
//!        reconnect within 30 s             deadline fires
//!                  │                             │
//!     game_state to player,           still the same disconnect?
//!     opponent_reconnected            ├─ yes → forfeit, game_forfeited
//!                                     └─ no  → nothing
//! ```
//!
//! Deadlines are never cancelled; they re-check the game when they fire.

mod client;
mod config;
mod error;
mod hub;
mod session;

pub use client::ClientHandle;
pub use config::HubConfig;
pub use error::HubError;
pub use hub::{ForfeitHook, Hub, Registration};
pub use session::{GameSession, game_state_for};
