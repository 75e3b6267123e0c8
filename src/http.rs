//! HTTP server for health and Prometheus metrics endpoints.
//!
//! Runs on a separate tokio task, serving `/` (banner), `/healthz`
//! (liveness with backing-store connectivity), and `/metrics`.

use crate::state::Relay;
use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

/// Handler for GET / - plain banner so load balancers see a 200.
async fn root_handler() -> &'static str {
    "roomcast relay is up :)\n"
}

/// Handler for GET /healthz - liveness plus store connectivity.
async fn healthz_handler(State(relay): State<Arc<Relay>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store_connected": relay.store.connected(),
    }))
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Run the HTTP server for health and metrics.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, relay: Arc<Relay>) {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(relay);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
