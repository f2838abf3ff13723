//! Error types for the matchmaking layer.

/// Errors returned by [`MatchmakingQueue`](crate::MatchmakingQueue).
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue actor has shut down (or its channel is gone).
    #[error("matchmaking queue is unavailable")]
    Unavailable,
}
