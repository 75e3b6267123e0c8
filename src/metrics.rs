//! Prometheus metrics collection for roomcast.
//!
//! Pure observer of the relay: counts and gauges only, no behavioral
//! coupling. Exposed in text format on the HTTP endpoint.
//!
//! - `relay_connected_clients` - currently connected clients (gauge)
//! - `relay_room_members{room}` - members per content room (gauge)
//! - `relay_active_rooms` - non-empty rooms (gauge)
//! - `relay_events_emitted_total{event}` - server events sent, by type
//! - `relay_follow_events_total{action}` - follow/unfollow requests
//! - `relay_store_retries_total` / `relay_presence_write_failures_total`
//!   - presence ledger resilience counters

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Server events emitted to clients, by event type.
pub static EVENTS_EMITTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Follow/unfollow requests, by action.
pub static FOLLOW_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Total client disconnections.
pub static DISCONNECTS: OnceLock<IntCounter> = OnceLock::new();

/// Presence ledger attempts retried after a transient store error.
pub static STORE_RETRIES: OnceLock<IntCounter> = OnceLock::new();

/// Presence ledger writes/deletes that definitively failed.
pub static PRESENCE_WRITE_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Volatile broadcasts dropped under backpressure.
pub static VOLATILE_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Reliable sends that timed out on a full queue and evicted the client.
pub static SEND_TIMEOUTS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Currently connected clients.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Members per content room.
pub static ROOM_MEMBERS: OnceLock<IntGaugeVec> = OnceLock::new();

/// Rooms with at least one member.
pub static ACTIVE_ROOMS: OnceLock<IntGauge> = OnceLock::new();

/// Backing store connectivity (1 connected, 0 not).
pub static STORE_CONNECTED: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Client event handling latency by event type.
pub static EVENT_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(EVENTS_EMITTED, IntCounterVec::new(Opts::new("relay_events_emitted_total", "Server events emitted to clients by type"), &["event"]));
    register!(FOLLOW_EVENTS, IntCounterVec::new(Opts::new("relay_follow_events_total", "Follow events by action"), &["action"]));
    register!(DISCONNECTS, IntCounter::new("relay_disconnects_total", "Total client disconnections"));
    register!(STORE_RETRIES, IntCounter::new("relay_store_retries_total", "Presence ledger attempts retried after a transient store error"));
    register!(PRESENCE_WRITE_FAILURES, IntCounterVec::new(Opts::new("relay_presence_write_failures_total", "Presence ledger operations that definitively failed"), &["op"]));
    register!(VOLATILE_DROPPED, IntCounter::new("relay_volatile_dropped_total", "Volatile broadcasts dropped under backpressure"));
    register!(SEND_TIMEOUTS, IntCounter::new("relay_send_timeouts_total", "Reliable sends that timed out and evicted the client"));
    register!(CONNECTED_CLIENTS, IntGauge::new("relay_connected_clients", "Currently connected clients"));
    register!(ROOM_MEMBERS, IntGaugeVec::new(Opts::new("relay_room_members", "Members per content room"), &["room"]));
    register!(ACTIVE_ROOMS, IntGauge::new("relay_active_rooms", "Rooms with at least one member"));
    register!(STORE_CONNECTED, IntGauge::new("relay_store_connected", "Backing store connectivity (1 connected)"));
    register!(EVENT_LATENCY, HistogramVec::new(
        HistogramOpts::new("relay_event_duration_seconds", "Client event handling latency by type")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["event"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for relay-specific metric updates
// ============================================================================

/// Record one server event emitted to a client.
#[inline]
pub fn record_event_emit(event: &str) {
    if let Some(c) = EVENTS_EMITTED.get() {
        c.with_label_values(&[event]).inc();
    }
}

/// Record a follow/unfollow request.
#[inline]
pub fn record_follow(action: &str) {
    if let Some(c) = FOLLOW_EVENTS.get() {
        c.with_label_values(&[action]).inc();
    }
}

/// Record a client disconnection.
#[inline]
pub fn record_disconnect() {
    if let Some(c) = DISCONNECTS.get() {
        c.inc();
    }
}

/// Record a presence ledger retry after a transient store error.
#[inline]
pub fn record_store_retry() {
    if let Some(c) = STORE_RETRIES.get() {
        c.inc();
    }
}

/// Record a presence ledger write/delete that exhausted its retries or
/// hit a permanent error.
#[inline]
pub fn record_presence_failure(op: &str) {
    if let Some(c) = PRESENCE_WRITE_FAILURES.get() {
        c.with_label_values(&[op]).inc();
    }
}

/// Record a volatile broadcast dropped under backpressure.
#[inline]
pub fn record_volatile_drop() {
    if let Some(c) = VOLATILE_DROPPED.get() {
        c.inc();
    }
}

/// Record a reliable send that timed out on a full client queue.
#[inline]
pub fn record_send_timeout() {
    if let Some(c) = SEND_TIMEOUTS.get() {
        c.inc();
    }
}

/// Adjust the connected clients gauge.
#[inline]
pub fn inc_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
}

#[inline]
pub fn dec_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}

/// Update a content room's member count gauge.
#[inline]
pub fn set_room_members(room: &str, count: i64) {
    if let Some(g) = ROOM_MEMBERS.get() {
        g.with_label_values(&[room]).set(count);
    }
}

/// Remove a room's member gauge series (when the room empties), so no
/// zero-sized rooms are reported as active.
#[inline]
pub fn remove_room_members(room: &str) {
    if let Some(g) = ROOM_MEMBERS.get() {
        let _ = g.remove_label_values(&[room]);
    }
}

/// Update the active rooms gauge.
#[inline]
pub fn set_active_rooms(count: i64) {
    if let Some(g) = ACTIVE_ROOMS.get() {
        g.set(count);
    }
}

/// Update the store connectivity gauge.
#[inline]
pub fn set_store_connected(connected: bool) {
    if let Some(g) = STORE_CONNECTED.get() {
        g.set(if connected { 1 } else { 0 });
    }
}

/// Record a client event's handling latency.
#[inline]
pub fn record_event_latency(event: &str, duration_secs: f64) {
    if let Some(h) = EVENT_LATENCY.get() {
        h.with_label_values(&[event]).observe(duration_secs);
    }
}
