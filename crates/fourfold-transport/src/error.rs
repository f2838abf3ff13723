/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed (includes frames over the size limit).
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The upgrade request didn't identify a valid player.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// The peer didn't finish the upgrade in time.
    #[error("handshake timed out")]
    HandshakeTimedOut,
}
