//! Wire protocol for Fourfold.
//!
//! This crate defines the "language" that browser clients and the game
//! server speak:
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`]):
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the message
//! router. It doesn't know about games, queues, or connections. It only
//! knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Router (hub, queue, engine)
//! ```
//!
//! Every frame is a JSON object of the form
//! `{ "type": "...", "payload": { ... }, "timestamp": "..." }`.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    BoardGrid, ClientMessage, Envelope, JoinQueuePayload, MakeMovePayload,
    ServerMessage,
};
