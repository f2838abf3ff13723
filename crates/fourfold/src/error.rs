//! Unified error type for the Fourfold server.

use fourfold_engine::MoveError;
use fourfold_hub::HubError;
use fourfold_matchmaking::QueueError;
use fourfold_protocol::ProtocolError;
use fourfold_transport::TransportError;

use crate::events::EventError;
use crate::store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl,
/// so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FourfoldError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A move or forfeit the rules refused.
    #[error(transparent)]
    Move(#[from] MoveError),

    /// The matchmaking actor is gone.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Registry or session failure.
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Event(#[from] EventError),
}
