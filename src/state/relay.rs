//! The Relay - central shared state for the process.
//!
//! One Relay per replica, constructed explicitly at startup and passed
//! as `Arc<Relay>` into every component; there are no ambient
//! singletons. It holds the room registry, the per-connection event
//! routing map, the presence ledger, and the synchronizer handle.

use crate::state::RoomRegistry;
use crate::store::{KvStore, PresenceLedger};
use crate::sync::Synchronizer;
use dashmap::DashMap;
use roomcast_proto::{ClientId, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// Outgoing event queue depth per connection. Reliable sends apply
/// backpressure when full; volatile sends drop.
pub const OUTGOING_QUEUE_SIZE: usize = 64;

/// How long a reliable send may wait on a full queue before the
/// connection is judged wedged and evicted. Bounds the worst case one
/// non-draining client can impose on the apply task.
const SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Central shared state container.
pub struct Relay {
    /// Room membership, mutated only by the synchronizer apply task.
    pub registry: RoomRegistry,

    /// Connection id to outgoing event sender, for routing.
    pub senders: DashMap<ClientId, mpsc::Sender<ServerEvent>>,

    /// Presence ledger over the backing store.
    pub ledger: PresenceLedger,

    /// Cross-instance synchronizer.
    pub sync: Synchronizer,

    /// Backing store handle, for health reporting.
    pub store: Arc<dyn KvStore>,
}

impl Relay {
    pub fn new(store: Arc<dyn KvStore>, ledger: PresenceLedger, sync: Synchronizer) -> Self {
        Self {
            registry: RoomRegistry::new(),
            senders: DashMap::new(),
            ledger,
            sync,
            store,
        }
    }

    /// Register a connection's outgoing event sender.
    pub fn register_sender(&self, conn: &ClientId, sender: mpsc::Sender<ServerEvent>) {
        self.senders.insert(conn.clone(), sender);
    }

    /// Unregister a connection's sender, but only if `sender` is still
    /// the registered one. Returns false when another connection has
    /// claimed the identity in the meantime, so a superseded
    /// connection's teardown cannot unregister its successor.
    pub fn unregister_sender_if(
        &self,
        conn: &ClientId,
        sender: &mpsc::Sender<ServerEvent>,
    ) -> bool {
        self.senders
            .remove_if(conn, |_, s| s.same_channel(sender))
            .is_some()
    }

    /// Send an event to one locally attached connection. Connections
    /// attached to other replicas are reached by those replicas' own
    /// apply tasks, never from here.
    ///
    /// The wait on a full queue is bounded: a client that has stopped
    /// draining gets its sender evicted instead of wedging the apply
    /// task. Losing every sender closes the connection's queue, which
    /// ends its event loop and runs normal teardown.
    pub async fn send_to_client(&self, conn: &ClientId, event: ServerEvent) {
        // Clone out of the map so no shard lock is held across the await.
        let sender = self.senders.get(conn).map(|s| s.clone());
        if let Some(sender) = sender {
            crate::metrics::record_event_emit(event.wire_name());
            if tokio::time::timeout(SEND_TIMEOUT, sender.send(event))
                .await
                .is_err()
            {
                crate::metrics::record_send_timeout();
                warn!(conn = %conn, "client not draining its queue, evicting");
                self.senders.remove_if(conn, |_, s| s.same_channel(&sender));
            }
        }
    }

    /// Best-effort variant of [`Relay::send_to_client`]: drops the
    /// event instead of waiting when the connection's queue is full.
    pub fn send_to_client_volatile(&self, conn: &ClientId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(conn) {
            crate::metrics::record_event_emit(event.wire_name());
            if sender.try_send(event).is_err() {
                crate::metrics::record_volatile_drop();
            }
        }
    }

    /// Send an event to every listed connection, optionally excluding
    /// one (usually the originator).
    pub async fn broadcast(
        &self,
        targets: &[ClientId],
        event: ServerEvent,
        exclude: Option<&ClientId>,
    ) {
        for target in targets {
            if exclude.is_some_and(|e| e == target) {
                continue;
            }
            self.send_to_client(target, event.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PresenceLedger, RetryPolicy};
    use crate::sync::Synchronizer;

    fn relay() -> Relay {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let ledger = PresenceLedger::new(Arc::clone(&store), RetryPolicy::default());
        let (sync, _apply_rx) = Synchronizer::local();
        Relay::new(store, ledger, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn non_draining_client_is_evicted_instead_of_wedging_sends() {
        let relay = relay();
        let conn = ClientId::from("stuck");
        let (tx, _rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
        relay.register_sender(&conn, tx);

        // Fill the queue without draining it, then one more.
        for _ in 0..=OUTGOING_QUEUE_SIZE {
            relay.send_to_client(&conn, ServerEvent::InitRoom).await;
        }

        // The overflowing send timed out and evicted the sender;
        // further sends are no-ops rather than waits.
        assert!(!relay.senders.contains_key(&conn));
        relay.send_to_client(&conn, ServerEvent::InitRoom).await;
    }

    #[tokio::test]
    async fn superseded_connection_cannot_unregister_its_successor() {
        let relay = relay();
        let conn = ClientId::from("sticky");

        let (old_tx, _old_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
        relay.register_sender(&conn, old_tx.clone());

        // Same identity reconnects; its sender replaces the old one.
        let (new_tx, mut new_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
        relay.register_sender(&conn, new_tx.clone());

        // The old connection's teardown finds it no longer owns the
        // identity and leaves the map alone.
        assert!(!relay.unregister_sender_if(&conn, &old_tx));
        relay.send_to_client(&conn, ServerEvent::InitRoom).await;
        assert_eq!(new_rx.try_recv(), Ok(ServerEvent::InitRoom));

        // The current owner can still unregister.
        assert!(relay.unregister_sender_if(&conn, &new_tx));
    }
}
