//! Error types for the hub.

/// Errors returned by [`Hub`](crate::Hub) operations.
///
/// The `Display` text of `NoSession` and `SessionGone` is sent to clients
/// as-is.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The player already has a game that hasn't finished.
    #[error("{0} is already in a game")]
    AlreadyInGame(String),

    /// No live connection is registered under this username.
    #[error("{0} is not connected")]
    NotConnected(String),

    /// The player isn't tracked in any game.
    #[error("No active session found")]
    NoSession,

    /// The player's tracked game has already been torn down.
    #[error("Session no longer exists")]
    SessionGone,

    /// The hub's event loop has stopped.
    #[error("connection hub is unavailable")]
    Unavailable,
}
