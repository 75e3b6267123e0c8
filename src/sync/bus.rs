//! Sync event transport.
//!
//! [`LocalBus`] loops events straight back onto the apply queue for
//! single-replica deployments. [`RedisBus`] publishes on the store's
//! pub/sub channel and runs a listener task on a dedicated connection
//! that feeds received events onto the apply queue, resubscribing after
//! connection loss.

use super::{SYNC_CHANNEL, SyncEvent};
use crate::error::StoreError;
use crate::store::RedisStore;
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long the listener waits before reopening a dropped subscription.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Fan-out transport for [`SyncEvent`]s.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, event: &SyncEvent) -> Result<(), StoreError>;
}

/// In-process loopback bus.
pub struct LocalBus {
    apply_tx: mpsc::Sender<SyncEvent>,
}

impl LocalBus {
    pub fn new(apply_tx: mpsc::Sender<SyncEvent>) -> Self {
        Self { apply_tx }
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn publish(&self, event: &SyncEvent) -> Result<(), StoreError> {
        self.apply_tx
            .send(event.clone())
            .await
            .map_err(|_| StoreError::Permanent("apply queue closed".into()))
    }
}

/// Store-backed pub/sub bus.
///
/// Publishing uses the shared command connection; the subscription runs
/// on its own connection because a subscribed Redis connection cannot
/// issue regular commands.
pub struct RedisBus {
    manager: ConnectionManager,
}

impl RedisBus {
    /// Create the bus and spawn its subscription listener.
    pub fn spawn(store: &RedisStore, apply_tx: mpsc::Sender<SyncEvent>) -> Self {
        let client = store.client();
        tokio::spawn(listen(client, apply_tx));
        Self {
            manager: store.manager(),
        }
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn publish(&self, event: &SyncEvent) -> Result<(), StoreError> {
        let json = serde_json::to_string(event)
            .map_err(|e| StoreError::Permanent(format!("sync event encode: {e}")))?;
        let mut conn = self.manager.clone();
        redis::AsyncCommands::publish::<_, _, ()>(&mut conn, SYNC_CHANNEL, json)
            .await
            .map_err(StoreError::from)
    }
}

/// Subscription loop. Runs for the life of the process; on any error the
/// subscription is reopened from the client after a short delay, so a
/// store failover costs at most a window of missed remote events.
async fn listen(client: redis::Client, apply_tx: mpsc::Sender<SyncEvent>) {
    loop {
        match client.get_async_pubsub().await {
            Ok(mut pubsub) => {
                if let Err(e) = pubsub.subscribe(SYNC_CHANNEL).await {
                    warn!(error = %e, "sync subscribe failed");
                } else {
                    debug!(channel = SYNC_CHANNEL, "sync subscription established");
                    let mut stream = pubsub.on_message();
                    while let Some(msg) = stream.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(error = %e, "sync message payload unreadable");
                                continue;
                            }
                        };
                        match serde_json::from_str::<SyncEvent>(&payload) {
                            Ok(event) => {
                                if apply_tx.send(event).await.is_err() {
                                    // Apply task gone, the process is shutting down.
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "discarding malformed sync event");
                            }
                        }
                    }
                    warn!("sync subscription closed");
                }
            }
            Err(e) => {
                warn!(error = %e, "sync subscription connect failed");
            }
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}
