//! Presence ledger - connection id to last-joined content room.
//!
//! The ledger exists so a reconnecting client can be offered its
//! previous room. It is never membership truth; the room registry is.
//! Writes and deletes are fire-and-forget from the caller's point of
//! view: each either succeeds, is retried up to the policy's bound, or
//! is logged (and counted) as a definite failure. No outcome is ever
//! raised to the membership state machine.

use super::{KvStore, RetryPolicy};
use roomcast_proto::{ClientId, RoomId};
use std::sync::Arc;
use tracing::{debug, error};

fn presence_key(conn: &ClientId) -> String {
    format!("user-room:{conn}")
}

/// Store-backed map from connection to its last-joined content room.
#[derive(Clone)]
pub struct PresenceLedger {
    store: Arc<dyn KvStore>,
    retry: RetryPolicy,
}

impl PresenceLedger {
    pub fn new(store: Arc<dyn KvStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Record that `conn` joined `room`. Best-effort.
    pub async fn remember(&self, conn: &ClientId, room: &RoomId) {
        let key = presence_key(conn);
        let value = room.to_string();
        let result = self
            .retry
            .run("presence-set", || {
                let store = Arc::clone(&self.store);
                let key = key.clone();
                let value = value.clone();
                async move { store.set(&key, &value).await }
            })
            .await;

        if let Err(e) = result {
            crate::metrics::record_presence_failure("set");
            error!(conn = %conn, room = %room, error = %e, "presence write failed");
        }
    }

    /// Clear `conn`'s presence record. Best-effort.
    pub async fn forget(&self, conn: &ClientId) {
        let key = presence_key(conn);
        let result = self
            .retry
            .run("presence-delete", || {
                let store = Arc::clone(&self.store);
                let key = key.clone();
                async move { store.del(&key).await }
            })
            .await;

        if let Err(e) = result {
            crate::metrics::record_presence_failure("delete");
            error!(conn = %conn, error = %e, "presence delete failed");
        }
    }

    /// Look up `conn`'s previous room, if any. A failed lookup is a
    /// missed reconnection hint, nothing more.
    pub async fn recall(&self, conn: &ClientId) -> Option<String> {
        match self.store.get(&presence_key(conn)).await {
            Ok(room) => room,
            Err(e) => {
                debug!(conn = %conn, error = %e, "presence lookup failed");
                None
            }
        }
    }
}
