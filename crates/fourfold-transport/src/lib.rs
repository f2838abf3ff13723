//! Transport abstraction layer for Fourfold.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network protocol. The rest of the server only ever sees "a stream
//! of byte frames from a named player", so the WebSocket details stay in
//! this crate.
//!
//! # Identity at the handshake
//!
//! A player's identity is fixed when the connection is accepted: the
//! upgrade request must carry a non-empty `username` query parameter
//! (at most [`MAX_USERNAME_LEN`] characters). Requests without one are
//! refused with HTTP 400 and never become a [`Connection`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingUpgrade, WebSocketConnection, WebSocketTransport, WsConfig,
};

use std::fmt;

/// Longest username accepted at the handshake, in characters.
pub const MAX_USERNAME_LEN: usize = 50;

/// Opaque identifier for a connection.
///
/// A player who reconnects gets a new `ConnectionId` under the same
/// username, which is how stale connections are told apart from fresh ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// Accepting is split in two: [`accept`](Transport::accept) only takes
/// the socket, and the protocol handshake runs later through
/// [`Handshake::upgrade`]. A peer that stalls mid-handshake then holds up
/// its own task and nobody else's.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted socket still waiting for its handshake.
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// The second half of accepting a connection.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Completes the handshake and identifies the player.
    ///
    /// A failed or timed-out handshake is reported as an error; only this
    /// connection is affected.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive byte frames.
///
/// Sending and receiving use independent halves, so a task blocked in
/// [`recv`](Connection::recv) never holds up another task's `send`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Sends a keep-alive ping. The peer's reply is consumed by `recv`.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the username presented at the handshake.
    fn username(&self) -> &str;
}
