//! Unified error handling for roomcast.
//!
//! Store errors carry a transient/permanent split that drives the
//! bounded retry policy, plus metric labeling. Connection-level errors
//! stay isolated to the connection task that produced them.

use thiserror::Error;

/// Errors from the shared backing store.
///
/// The transient class means "the contacted node is a replica and not
/// currently writable" — the condition seen mid primary-failover. Only
/// this class is retried; everything else propagates immediately.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient store error: {0}")]
    Transient(String),

    #[error("store error: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Whether the bounded retry policy should retry this error.
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Permanent(_) => "permanent",
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        use redis::ErrorKind;
        match e.kind() {
            // READONLY / failover-in-progress replies settle once the
            // topology converges on a new primary.
            ErrorKind::ReadOnly
            | ErrorKind::MasterDown
            | ErrorKind::TryAgain
            | ErrorKind::ClusterDown => Self::Transient(e.to_string()),
            _ => Self::Permanent(e.to_string()),
        }
    }
}

/// Errors from a single client connection's event loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("protocol error: {0}")]
    Protocol(#[from] roomcast_proto::ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
