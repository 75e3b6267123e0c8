//! Backing store layer.
//!
//! A `KvStore` backend holds the presence ledger; the Redis backend also
//! carries the pub/sub channel the synchronizer rides on. The memory
//! backend serves single-replica deployments and tests.

pub mod memory;
mod presence;
pub mod redis;
mod retry;
#[cfg(test)]
pub mod testutil;

pub use memory::MemoryStore;
pub use presence::PresenceLedger;
pub use redis::RedisStore;
pub use retry::RetryPolicy;

use crate::error::StoreError;
use async_trait::async_trait;

/// Resilient handle to the shared key-value store.
///
/// Implementations own reconnection; callers only see errors classified
/// as transient or permanent ([`StoreError`]).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a key's value, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a key to a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Whether the store link is currently believed healthy.
    fn connected(&self) -> bool;
}
