//! Cross-instance synchronizer.
//!
//! Membership changes and broadcasts are published as [`SyncEvent`]s on
//! the backing store's pub/sub channel and applied by every replica's
//! apply task — the originator included. Self-delivery is deliberate:
//! origin and remote replicas share one code path for mutating the
//! registry and notifying their locally attached connections.
//!
//! Ordering: the subscription delivers FIFO per channel; publishing
//! happens before the initiating handler returns, delivery to remote
//! members is asynchronous and not awaited.

mod bus;

pub use bus::{Bus, LocalBus, RedisBus};

use roomcast_proto::{ClientId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Pub/sub channel carrying sync events between replicas.
pub const SYNC_CHANNEL: &str = "roomcast:events";

/// Depth of the apply queue feeding a replica's apply task.
const APPLY_QUEUE_SIZE: usize = 1024;

/// Why a connection left a room. Follow rooms notify the followed
/// connection differently for an explicit unfollow than for a
/// follower's disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    Unfollow,
    Disconnect,
}

/// An event fanned out to every replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    Join {
        conn: ClientId,
        room: RoomId,
    },
    Leave {
        conn: ClientId,
        room: RoomId,
        reason: LeaveReason,
    },
    Broadcast {
        room: RoomId,
        from: ClientId,
        payload: Value,
        iv: Value,
        volatile: bool,
    },
    /// The connection is gone; release every membership it holds.
    ///
    /// Room enumeration happens in the apply step, not at publish time:
    /// the channel is FIFO, so any join still in flight lands in the
    /// registry before this event is applied and gets released too.
    Disconnect {
        conn: ClientId,
    },
}

/// Publishes sync events and owns the apply queue they come back on.
pub struct Synchronizer {
    bus: Arc<dyn Bus>,
    apply_tx: mpsc::Sender<SyncEvent>,
}

impl Synchronizer {
    /// In-process loopback synchronizer for single-replica deployments
    /// and tests. Events go straight onto the apply queue.
    pub fn local() -> (Self, mpsc::Receiver<SyncEvent>) {
        let (apply_tx, apply_rx) = mpsc::channel(APPLY_QUEUE_SIZE);
        let bus = Arc::new(LocalBus::new(apply_tx.clone()));
        (Self { bus, apply_tx }, apply_rx)
    }

    /// Store-backed synchronizer. Spawns the subscription listener that
    /// feeds the apply queue, resubscribing on connection loss.
    pub fn redis(store: &crate::store::RedisStore) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (apply_tx, apply_rx) = mpsc::channel(APPLY_QUEUE_SIZE);
        let bus = Arc::new(RedisBus::spawn(store, apply_tx.clone()));
        (Self { bus, apply_tx }, apply_rx)
    }

    /// Publish an event to every replica.
    ///
    /// If the bus is unreachable the event is still pushed onto the
    /// local apply queue: locally attached connections must never
    /// observe state the registry doesn't, and cross-replica consistency
    /// is best-effort by contract.
    pub async fn publish(&self, event: SyncEvent) {
        if let Err(e) = self.bus.publish(&event).await {
            warn!(error = %e, "sync publish failed; applying locally only");
            if self.apply_tx.send(event).await.is_err() {
                error!("apply queue closed; sync event dropped");
            }
        }
    }
}
