//! # roomcast-proto
//!
//! Wire protocol types for the roomcast presence and broadcast relay.
//!
//! The relay speaks JSON over WebSocket. Every frame is a tagged event:
//!
//! ```json
//! {"type": "join-room", "data": {"room_id": "whiteboard-7"}}
//! ```
//!
//! This crate owns the event vocabulary in both directions
//! ([`ClientEvent`], [`ServerEvent`]) and the identifier types shared
//! with the daemon ([`ClientId`], [`RoomId`]). Room kinds are a tagged
//! enum rather than a string convention: the reserved `follow@` prefix
//! exists only in the wire form and is parsed exactly once, at this
//! boundary.
//!
//! ```rust
//! use roomcast_proto::{ClientId, RoomId};
//!
//! let room: RoomId = "follow@c81a".parse().unwrap();
//! assert_eq!(room, RoomId::Follow(ClientId::from("c81a")));
//! assert_eq!(room.to_string(), "follow@c81a");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod event;
mod room;

pub use event::{ClientEvent, FollowAction, ServerEvent, UserToFollow};
pub use room::{ClientId, RoomId, FOLLOW_PREFIX};

use thiserror::Error;

/// Errors produced while decoding a client frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or did not match any known event.
    #[error("malformed client event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame was a WebSocket message kind the relay does not accept.
    #[error("unsupported frame kind: {0}")]
    UnsupportedFrame(&'static str),
}

/// Decode a client frame from its JSON text form.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a server event to its JSON text form.
///
/// Serialization of these types cannot fail; the signature stays
/// infallible so call sites don't have to invent an error path.
pub fn encode_server_event(event: &ServerEvent) -> String {
    serde_json::to_string(event).expect("server events serialize to JSON")
}
