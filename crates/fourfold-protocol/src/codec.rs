//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The router doesn't care HOW frames are serialized; it just needs
//! something that implements [`Codec`].
//!
//! Decoding inbound frames happens in two stages so the router can tell
//! the three failure kinds apart:
//!
//! 1. Parse the envelope (`type` + raw `payload`) → [`ProtocolError::Decode`]
//! 2. Match `type` against the known kinds → [`ProtocolError::UnknownType`]
//! 3. Parse the payload for that kind → [`ProtocolError::InvalidPayload`]

use serde::Serialize;

use crate::{ClientMessage, ProtocolError};

/// A codec that can encode outbound values and decode inbound frames.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes one inbound frame into a typed [`ClientMessage`].
    ///
    /// # Errors
    /// - `Decode`: not an envelope
    /// - `UnknownType`: envelope `type` isn't a client message kind
    /// - `InvalidPayload`: payload doesn't fit the kind
    fn decode_client(
        &self,
        data: &[u8],
    ) -> Result<ClientMessage, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use fourfold_protocol::{ClientMessage, Codec, JsonCodec, MakeMovePayload};
///
/// let codec = JsonCodec;
/// let frame = br#"{"type":"make_move","payload":{"column":3}}"#;
///
/// let msg = codec.decode_client(frame).unwrap();
/// assert_eq!(msg, ClientMessage::MakeMove(MakeMovePayload { column: 3 }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

/// Stage one of inbound decoding: the envelope with its payload still raw.
/// Any client-supplied `timestamp` is ignored.
#[cfg(feature = "json")]
#[derive(serde::Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode_client(
        &self,
        data: &[u8],
    ) -> Result<ClientMessage, ProtocolError> {
        let frame: InboundFrame =
            serde_json::from_slice(data).map_err(ProtocolError::Decode)?;

        match frame.kind.as_str() {
            ClientMessage::JOIN_QUEUE => {
                // `join_queue` with no payload at all is fine.
                if frame.payload.is_null() {
                    return Ok(ClientMessage::JoinQueue(Default::default()));
                }
                payload(ClientMessage::JOIN_QUEUE, frame.payload)
                    .map(ClientMessage::JoinQueue)
            }
            ClientMessage::MAKE_MOVE => {
                payload(ClientMessage::MAKE_MOVE, frame.payload)
                    .map(ClientMessage::MakeMove)
            }
            // The remaining kinds carry no data; whatever payload the
            // client attached (usually `{}`) is ignored.
            ClientMessage::LEAVE_GAME => Ok(ClientMessage::LeaveGame),
            ClientMessage::RESUME_SESSION => Ok(ClientMessage::ResumeSession),
            ClientMessage::ABANDON_SESSION => {
                Ok(ClientMessage::AbandonSession)
            }
            _ => Err(ProtocolError::UnknownType(frame.kind)),
        }
    }
}

#[cfg(feature = "json")]
fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    value: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value)
        .map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, JoinQueuePayload, MakeMovePayload, ServerMessage};

    fn decode(raw: &str) -> Result<ClientMessage, ProtocolError> {
        JsonCodec.decode_client(raw.as_bytes())
    }

    #[test]
    fn test_decode_join_queue_with_username() {
        let msg =
            decode(r#"{"type":"join_queue","payload":{"username":"alice"}}"#)
                .unwrap();

        assert_eq!(
            msg,
            ClientMessage::JoinQueue(JoinQueuePayload {
                username: Some("alice".into())
            })
        );
    }

    #[test]
    fn test_decode_join_queue_without_payload() {
        let msg = decode(r#"{"type":"join_queue"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinQueue(JoinQueuePayload::default()));
    }

    #[test]
    fn test_decode_make_move_negative_column_is_kept() {
        let msg =
            decode(r#"{"type":"make_move","payload":{"column":-1}}"#).unwrap();
        assert_eq!(msg, ClientMessage::MakeMove(MakeMovePayload { column: -1 }));
    }

    #[test]
    fn test_decode_leave_game_ignores_empty_payload() {
        let msg = decode(
            r#"{"type":"leave_game","payload":{},"timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::LeaveGame);
    }

    #[test]
    fn test_decode_unknown_type_returns_unknown_type() {
        let result = decode(r#"{"type":"fly_away","payload":{}}"#);
        assert!(
            matches!(result, Err(ProtocolError::UnknownType(ref k)) if k == "fly_away"),
            "got {result:?}"
        );
    }

    #[test]
    fn test_decode_make_move_bad_payload_returns_invalid_payload() {
        let result =
            decode(r#"{"type":"make_move","payload":{"column":"three"}}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidPayload { kind: "make_move", .. })
        ));
    }

    #[test]
    fn test_decode_make_move_missing_payload_returns_invalid_payload() {
        let result = decode(r#"{"type":"make_move"}"#);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidPayload { kind: "make_move", .. })
        ));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        assert!(matches!(decode("not json"), Err(ProtocolError::Decode(_))));
        assert!(matches!(
            decode(r#"{"payload":{}}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_encode_envelope_is_valid_json() {
        let bytes = JsonCodec
            .encode(&Envelope::now(ServerMessage::QueueJoined { position: 2 }))
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "queue_joined");
        assert_eq!(value["payload"]["position"], 2);
    }
}
