//! Client-facing event vocabulary.
//!
//! Payloads carried by broadcast events are opaque: encrypted blobs plus
//! an initialization vector, forwarded verbatim as [`serde_json::Value`]
//! and never inspected by the relay.

use crate::room::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events accepted from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a content room by name.
    JoinRoom {
        /// Wire-level room name.
        room_id: String,
    },

    /// Relay an opaque payload to every other member of a room.
    ServerBroadcast {
        /// Wire-level room name.
        room_id: String,
        /// Opaque encrypted payload.
        payload: Value,
        /// Initialization vector for the payload.
        iv: Value,
    },

    /// Best-effort variant of [`ClientEvent::ServerBroadcast`]; may be
    /// dropped under backpressure.
    ServerVolatileBroadcast {
        /// Wire-level room name.
        room_id: String,
        /// Opaque encrypted payload.
        payload: Value,
        /// Initialization vector for the payload.
        iv: Value,
    },

    /// Start or stop following another connection.
    UserFollow {
        /// The connection to follow or unfollow.
        user_to_follow: UserToFollow,
        /// Whether this is a follow or an unfollow.
        action: FollowAction,
    },
}

impl ClientEvent {
    /// The event's wire-level type name, for logging and metric labels.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::ServerBroadcast { .. } => "server-broadcast",
            ClientEvent::ServerVolatileBroadcast { .. } => "server-volatile-broadcast",
            ClientEvent::UserFollow { .. } => "user-follow",
        }
    }
}

/// The target of a `user-follow` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToFollow {
    /// The followed connection's identity.
    pub client_id: ClientId,
    /// Display name supplied by the client; carried for symmetry with
    /// the client payload, not interpreted by the relay.
    pub username: String,
}

/// Direction of a `user-follow` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FollowAction {
    /// Join the target's follow room.
    Follow,
    /// Leave the target's follow room.
    Unfollow,
}

impl FollowAction {
    /// Static label for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FollowAction::Follow => "FOLLOW",
            FollowAction::Unfollow => "UNFOLLOW",
        }
    }
}

/// Events emitted to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once immediately after the connection is accepted.
    InitRoom,

    /// The joiner is the sole member of the room it just joined.
    FirstInRoom,

    /// A new member joined the room; carries the joiner's identity.
    NewUser(ClientId),

    /// Full membership list of a content room after a change.
    RoomUserChange(Vec<ClientId>),

    /// Opaque relayed payload from another room member.
    ClientBroadcast {
        /// Opaque encrypted payload.
        payload: Value,
        /// Initialization vector for the payload.
        iv: Value,
    },

    /// Follower list of the receiving connection changed.
    UserFollowRoomChange(Vec<ClientId>),

    /// The receiving connection's last follower departed.
    BroadcastUnfollow,

    /// The room this connection was in before it last disconnected,
    /// recovered from the presence ledger.
    ReconnectRoom(String),
}

impl ServerEvent {
    /// The event's wire-level type name, for logging and metric labels.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ServerEvent::InitRoom => "init-room",
            ServerEvent::FirstInRoom => "first-in-room",
            ServerEvent::NewUser(_) => "new-user",
            ServerEvent::RoomUserChange(_) => "room-user-change",
            ServerEvent::ClientBroadcast { .. } => "client-broadcast",
            ServerEvent::UserFollowRoomChange(_) => "user-follow-room-change",
            ServerEvent::BroadcastUnfollow => "broadcast-unfollow",
            ServerEvent::ReconnectRoom(_) => "reconnect-room",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_use_kebab_case_wire_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "join-room",
            "data": {"room_id": "r1"}
        }))
        .unwrap();
        assert_eq!(event, ClientEvent::JoinRoom { room_id: "r1".into() });

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "user-follow",
            "data": {
                "user_to_follow": {"client_id": "abc", "username": "alice"},
                "action": "FOLLOW"
            }
        }))
        .unwrap();
        match event {
            ClientEvent::UserFollow { user_to_follow, action } => {
                assert_eq!(user_to_follow.client_id, ClientId::from("abc"));
                assert_eq!(action, FollowAction::Follow);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn broadcast_payloads_pass_through_unmodified() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "server-broadcast",
            "data": {"room_id": "r1", "payload": {"blob": [1, 2, 3]}, "iv": "aGVsbG8="}
        }))
        .unwrap();
        match event {
            ClientEvent::ServerBroadcast { payload, iv, .. } => {
                assert_eq!(payload, json!({"blob": [1, 2, 3]}));
                assert_eq!(iv, json!("aGVsbG8="));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_events_use_kebab_case_wire_names() {
        let text = crate::encode_server_event(&ServerEvent::FirstInRoom);
        assert_eq!(text, r#"{"type":"first-in-room"}"#);

        let text = crate::encode_server_event(&ServerEvent::NewUser(ClientId::from("abc")));
        assert_eq!(text, r#"{"type":"new-user","data":"abc"}"#);

        let text = crate::encode_server_event(&ServerEvent::RoomUserChange(vec![
            ClientId::from("a"),
            ClientId::from("b"),
        ]));
        assert_eq!(text, r#"{"type":"room-user-change","data":["a","b"]}"#);

        let text = crate::encode_server_event(&ServerEvent::BroadcastUnfollow);
        assert_eq!(text, r#"{"type":"broadcast-unfollow"}"#);

        let text = crate::encode_server_event(&ServerEvent::ReconnectRoom("r1".into()));
        assert_eq!(text, r#"{"type":"reconnect-room","data":"r1"}"#);
    }
}
