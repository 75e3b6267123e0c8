//! Test-only store doubles.

use super::{KvStore, MemoryStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

/// Store that fails the first `failures` operations with a transient
/// error, then delegates to a memory store. Models a primary failover
/// window.
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures: AtomicU32,
}

impl FlakyStore {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures: AtomicU32::new(failures),
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            Err(StoreError::Transient("READONLY".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.trip()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.set(key, value).await
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.del(key).await
    }

    fn connected(&self) -> bool {
        true
    }
}
