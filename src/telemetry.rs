//! Telemetry utilities for event timing.

use std::time::Instant;

/// Guard for timing client event handling and recording metrics.
///
/// Records event latency when dropped.
pub struct EventTimer {
    event: &'static str,
    start: Instant,
}

impl EventTimer {
    /// Start timing a client event.
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            start: Instant::now(),
        }
    }
}

impl Drop for EventTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_event_latency(self.event, duration);
    }
}

/// Standardized span constructors for relay observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a client connection.
    pub fn connection(id: &str, addr: &std::net::SocketAddr) -> Span {
        info_span!("connection", id = %id, addr = %addr)
    }
}
