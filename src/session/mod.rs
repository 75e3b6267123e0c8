//! Session layer - client event handlers and the sync apply task.
//!
//! Handlers run in the connection task and do the minimum: touch the
//! presence ledger and publish sync events. All membership mutation and
//! all notification fan-out happen in [`run_apply_loop`], the single
//! task consuming the apply queue. Because every replica (the
//! originator included) observes the same event stream in the same
//! order, the registry and the notifications derived from it stay
//! consistent without cross-task locking.

use crate::state::Relay;
use crate::sync::{LeaveReason, SyncEvent};
use crate::telemetry::EventTimer;
use roomcast_proto::{ClientEvent, ClientId, FollowAction, RoomId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Greet a freshly accepted connection. Must be called after the
/// connection's sender is registered so the greeting has somewhere to
/// go.
pub async fn on_connect(relay: &Relay, conn: &ClientId) {
    crate::metrics::inc_connected();
    relay.send_to_client(conn, ServerEvent::InitRoom).await;

    // Offer the room this identity was in before its last disconnect.
    if let Some(room) = relay.ledger.recall(conn).await {
        debug!(conn = %conn, room = %room, "offering reconnection");
        relay
            .send_to_client(conn, ServerEvent::ReconnectRoom(room))
            .await;
    }
}

/// Dispatch one decoded client event.
pub async fn handle_client_event(relay: &Arc<Relay>, conn: &ClientId, event: ClientEvent) {
    let _timer = EventTimer::new(event.wire_name());
    match event {
        ClientEvent::JoinRoom { room_id } => {
            on_join_room(relay, conn, room_id).await;
        }
        ClientEvent::ServerBroadcast {
            room_id,
            payload,
            iv,
        } => {
            on_broadcast(relay, conn, room_id, payload, iv, false).await;
        }
        ClientEvent::ServerVolatileBroadcast {
            room_id,
            payload,
            iv,
        } => {
            on_broadcast(relay, conn, room_id, payload, iv, true).await;
        }
        ClientEvent::UserFollow {
            user_to_follow,
            action,
        } => {
            on_follow(relay, conn, user_to_follow.client_id, action).await;
        }
    }
}

async fn on_join_room(relay: &Arc<Relay>, conn: &ClientId, room_id: String) {
    let room = RoomId::from(room_id);
    info!(conn = %conn, room = %room, "join");

    if !room.is_follow() {
        // The presence write must not gate the join: a struggling store
        // slows reconnection hints, never membership.
        let ledger = relay.ledger.clone();
        let conn = conn.clone();
        let room = room.clone();
        tokio::spawn(async move { ledger.remember(&conn, &room).await });
    }

    relay
        .sync
        .publish(SyncEvent::Join {
            conn: conn.clone(),
            room,
        })
        .await;
}

async fn on_broadcast(
    relay: &Arc<Relay>,
    conn: &ClientId,
    room_id: String,
    payload: serde_json::Value,
    iv: serde_json::Value,
    volatile: bool,
) {
    let room = RoomId::from(room_id);
    relay
        .sync
        .publish(SyncEvent::Broadcast {
            room,
            from: conn.clone(),
            payload,
            iv,
            volatile,
        })
        .await;
}

async fn on_follow(relay: &Arc<Relay>, conn: &ClientId, target: ClientId, action: FollowAction) {
    crate::metrics::record_follow(action.as_str());
    let room = RoomId::Follow(target);
    info!(conn = %conn, room = %room, action = action.as_str(), "follow change");

    let event = match action {
        FollowAction::Follow => SyncEvent::Join {
            conn: conn.clone(),
            room,
        },
        FollowAction::Unfollow => SyncEvent::Leave {
            conn: conn.clone(),
            room,
            reason: LeaveReason::Unfollow,
        },
    };
    relay.sync.publish(event).await;
}

/// Tear down a connection that owned its identity until the end: clear
/// its presence record and release every membership.
///
/// Rooms are NOT enumerated here. A join published moments before the
/// disconnect may still be in flight on the bus, invisible to this
/// replica's registry; enumerating in the apply step, behind the FIFO
/// channel, sees it.
pub async fn on_disconnecting(relay: &Arc<Relay>, conn: &ClientId) {
    info!(conn = %conn, "disconnecting");

    let ledger = relay.ledger.clone();
    let ledger_conn = conn.clone();
    tokio::spawn(async move { ledger.forget(&ledger_conn).await });

    relay
        .sync
        .publish(SyncEvent::Disconnect { conn: conn.clone() })
        .await;

    crate::metrics::record_disconnect();
    crate::metrics::dec_connected();
}

/// Tear down a connection whose identity was claimed by a newer
/// connection. The memberships and presence record now belong to the
/// successor, so only this connection's own accounting is touched.
pub fn on_superseded(conn: &ClientId) {
    debug!(conn = %conn, "connection superseded by a newer one");
    crate::metrics::record_disconnect();
    crate::metrics::dec_connected();
}

/// Consume the apply queue until it closes. Exactly one of these runs
/// per replica.
pub async fn run_apply_loop(relay: Arc<Relay>, mut apply_rx: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = apply_rx.recv().await {
        apply(&relay, event).await;
    }
    info!("apply queue closed, apply task exiting");
}

/// Apply one sync event: mutate the registry, then notify the locally
/// attached connections the change concerns.
pub async fn apply(relay: &Relay, event: SyncEvent) {
    match event {
        SyncEvent::Join { conn, room } => apply_join(relay, conn, room).await,
        SyncEvent::Leave { conn, room, reason } => apply_leave(relay, conn, room, reason).await,
        SyncEvent::Broadcast {
            room,
            from,
            payload,
            iv,
            volatile,
        } => apply_broadcast(relay, room, from, payload, iv, volatile).await,
        SyncEvent::Disconnect { conn } => apply_disconnect(relay, conn).await,
    }
}

/// Release every membership a disconnected connection holds. Runs on
/// the apply task, after any of the connection's joins still queued
/// ahead of it.
async fn apply_disconnect(relay: &Relay, conn: ClientId) {
    for room in relay.registry.rooms_of(&conn) {
        apply_leave(relay, conn.clone(), room, LeaveReason::Disconnect).await;
    }
}

async fn apply_join(relay: &Relay, conn: ClientId, room: RoomId) {
    let snapshot = relay.registry.apply_join(&conn, &room);

    match &room {
        RoomId::Content(name) => {
            crate::metrics::set_room_members(name, snapshot.len() as i64);
            if snapshot.len() <= 1 {
                // Sole member; the membership list would only repeat
                // what first-in-room already says.
                relay.send_to_client(&conn, ServerEvent::FirstInRoom).await;
            } else {
                relay
                    .broadcast(&snapshot, ServerEvent::NewUser(conn.clone()), Some(&conn))
                    .await;
                relay
                    .broadcast(&snapshot, ServerEvent::RoomUserChange(snapshot.clone()), None)
                    .await;
            }
        }
        RoomId::Follow(followed) => {
            relay
                .send_to_client(followed, ServerEvent::UserFollowRoomChange(snapshot))
                .await;
        }
    }
    crate::metrics::set_active_rooms(relay.registry.active_rooms() as i64);
}

async fn apply_leave(relay: &Relay, conn: ClientId, room: RoomId, reason: LeaveReason) {
    let outcome = relay.registry.apply_leave(&conn, &room);

    match &room {
        RoomId::Content(name) => {
            if !outcome.removed {
                // Already applied (or never joined); nothing to announce.
                return;
            }
            if outcome.emptied {
                crate::metrics::remove_room_members(name);
            } else {
                crate::metrics::set_room_members(name, outcome.remaining.len() as i64);
                relay
                    .broadcast(
                        &outcome.remaining,
                        ServerEvent::RoomUserChange(outcome.remaining.clone()),
                        None,
                    )
                    .await;
            }
        }
        RoomId::Follow(followed) => match reason {
            LeaveReason::Unfollow => {
                // An explicit unfollow always restates the follower
                // list, even when the requester was never following.
                relay
                    .send_to_client(
                        followed,
                        ServerEvent::UserFollowRoomChange(outcome.remaining),
                    )
                    .await;
            }
            LeaveReason::Disconnect => {
                if outcome.removed && outcome.emptied {
                    relay
                        .send_to_client(followed, ServerEvent::BroadcastUnfollow)
                        .await;
                }
            }
        },
    }
    crate::metrics::set_active_rooms(relay.registry.active_rooms() as i64);
}

async fn apply_broadcast(
    relay: &Relay,
    room: RoomId,
    from: ClientId,
    payload: serde_json::Value,
    iv: serde_json::Value,
    volatile: bool,
) {
    let members = relay.registry.members(&room);
    for member in &members {
        if *member == from {
            continue;
        }
        let event = ServerEvent::ClientBroadcast {
            payload: payload.clone(),
            iv: iv.clone(),
        };
        if volatile {
            relay.send_to_client_volatile(member, event);
        } else {
            relay.send_to_client(member, event).await;
        }
    }
}
