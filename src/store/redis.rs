//! Redis store backend.
//!
//! Commands go through a [`ConnectionManager`], which keeps a
//! persistent connection, reconnects automatically, and re-resolves the
//! primary through the client on failover rather than retrying a dead
//! address. Subscriptions use a separate dedicated connection (see
//! [`crate::sync::RedisBus`]); the two never share a socket.

use super::KvStore;
use crate::error::StoreError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Redis-backed key-value store and pub/sub endpoint.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
    connected: Arc<AtomicBool>,
}

impl RedisStore {
    /// Connect to the store at `url`.
    ///
    /// Fails when the initial connection cannot be established; after
    /// that, reconnection is handled internally.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(StoreError::from)?;
        crate::metrics::set_store_connected(true);
        Ok(Self {
            client,
            manager,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    /// A client handle for opening the dedicated subscription connection.
    pub fn client(&self) -> redis::Client {
        self.client.clone()
    }

    /// A command connection handle (cheap clone, shared multiplexed link).
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Record the outcome of a store round trip for health reporting.
    pub(crate) fn track<T>(&self, result: Result<T, redis::RedisError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                self.mark_connected(true);
                Ok(value)
            }
            Err(e) => {
                if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() {
                    self.mark_connected(false);
                }
                Err(StoreError::from(e))
            }
        }
    }

    fn mark_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        crate::metrics::set_store_connected(connected);
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        self.track(conn.get::<_, Option<String>>(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.track(conn.set::<_, _, ()>(key, value).await)
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        self.track(conn.del::<_, ()>(key).await)
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
