//! Error types for the protocol layer.
//!
//! Each crate in Fourfold defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or in the
//! shape of a frame, not in game rules or networking.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame isn't a valid envelope at all: not JSON, not an object,
    /// or missing the `type` field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed, but its `type` isn't one the server handles.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The envelope's `type` is known, but its payload has the wrong
    /// shape (e.g. `make_move` with a string column).
    #[cfg(feature = "json")]
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
