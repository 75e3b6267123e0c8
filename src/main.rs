//! roomcastd - real-time presence and broadcast relay.
//!
//! Accepts WebSocket connections, tracks room membership, and relays
//! opaque encrypted payloads between room members. Replicas coordinate
//! through a Redis-backed synchronizer; without a store the relay runs
//! standalone.

mod config;
mod error;
mod http;
mod metrics;
mod network;
mod session;
mod state;
mod store;
mod sync;
mod telemetry;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Relay;
use crate::store::{KvStore, MemoryStore, PresenceLedger, RedisStore, RetryPolicy};
use crate::sync::Synchronizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load_or_default(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.server.listen,
        "Starting roomcastd"
    );

    let retry = RetryPolicy::new(
        config.store.retry_attempts,
        Duration::from_millis(config.store.retry_delay_ms),
    );

    // With a store URL, presence and sync go through Redis and replicas
    // see each other. Without one, both stay in-process.
    let (kv, sync, apply_rx): (Arc<dyn KvStore>, Synchronizer, _) = match &config.store.url {
        Some(url) => {
            let redis = RedisStore::connect(url).await.map_err(|e| {
                error!(error = %e, "Failed to connect to store");
                anyhow::anyhow!("store connection failed: {e}")
            })?;
            info!("Connected to store");
            let (sync, apply_rx) = Synchronizer::redis(&redis);
            (Arc::new(redis) as Arc<dyn KvStore>, sync, apply_rx)
        }
        None => {
            info!("No store configured, running standalone");
            let (sync, apply_rx) = Synchronizer::local();
            (
                Arc::new(MemoryStore::new()) as Arc<dyn KvStore>,
                sync,
                apply_rx,
            )
        }
    };

    let ledger = PresenceLedger::new(Arc::clone(&kv), retry);
    let relay = Arc::new(Relay::new(kv, ledger, sync));

    // Single apply task per replica; all membership mutation goes
    // through it.
    tokio::spawn(session::run_apply_loop(Arc::clone(&relay), apply_rx));

    // Metrics and health endpoint (port 0 disables)
    let metrics_port = config.metrics.port;
    if metrics_port > 0 {
        metrics::init();
        info!("Metrics initialized");

        let http_relay = Arc::clone(&relay);
        tokio::spawn(async move {
            http::run_http_server(metrics_port, http_relay).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    // Bind the gateway and accept connections
    let gateway = Gateway::bind(config.server.listen, config.websocket.clone(), relay).await?;
    gateway.run().await
}
