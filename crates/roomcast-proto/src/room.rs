//! Connection and room identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved prefix marking a follow room in the wire-level room name.
pub const FOLLOW_PREFIX: &str = "follow@";

/// Identity of one live client connection.
///
/// Opaque to the relay: assigned by the transport layer at connect time
/// (or presented by a reconnecting client) and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// View the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId(s)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        ClientId(s.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room identity, tagged by kind.
///
/// Content rooms carry arbitrary application-chosen names. Follow rooms
/// model "who is watching connection X" and derive their name from the
/// followed connection's identity. On the wire both are plain strings;
/// the `follow@` prefix is applied and stripped only here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoomId {
    /// Application-level room for collaborative payload exchange.
    Content(String),
    /// Reserved room holding the followers of one connection.
    Follow(ClientId),
}

impl RoomId {
    /// Build the follow room for a given connection.
    pub fn follow(target: impl Into<ClientId>) -> Self {
        RoomId::Follow(target.into())
    }

    /// Whether this is a follow room.
    pub fn is_follow(&self) -> bool {
        matches!(self, RoomId::Follow(_))
    }

    /// The followed connection, if this is a follow room.
    pub fn followed(&self) -> Option<&ClientId> {
        match self {
            RoomId::Follow(target) => Some(target),
            RoomId::Content(_) => None,
        }
    }
}

impl FromStr for RoomId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix(FOLLOW_PREFIX) {
            Some(target) => RoomId::Follow(ClientId::from(target)),
            None => RoomId::Content(s.to_string()),
        })
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        match s.strip_prefix(FOLLOW_PREFIX) {
            Some(target) => RoomId::Follow(ClientId::from(target)),
            None => RoomId::Content(s),
        }
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> String {
        room.to_string()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::Content(name) => f.write_str(name),
            RoomId::Follow(target) => write!(f, "{FOLLOW_PREFIX}{target}"),
        }
    }
}
