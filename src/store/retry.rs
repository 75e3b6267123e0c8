//! Bounded retry policy for presence ledger writes.

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry over the transient store-error class.
///
/// Retries only errors whose [`StoreError::is_transient`] is true — the
/// "this node is a replica, not currently writable" class seen during
/// primary failover. The delay between attempts is fixed and must be
/// non-zero so the failover has a moment to settle. Permanent errors
/// and exhausted retries propagate to the caller.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given attempt bound and fixed delay.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the
    /// attempt bound is reached.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut tries = 1;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && tries < self.max_attempts => {
                    crate::metrics::record_store_retry();
                    warn!(op, attempt = tries, error = %e, "transient store error, retrying");
                    tokio::time::sleep(self.delay).await;
                    tries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}
