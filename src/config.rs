//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity and listen address.
    pub server: ServerConfig,
    /// Backing store configuration.
    pub store: StoreConfig,
    /// Prometheus metrics / health HTTP endpoint.
    pub metrics: MetricsConfig,
    /// WebSocket handshake policy.
    pub websocket: WebSocketConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name used in logs (e.g., "relay-eu-1").
    pub name: String,
    /// Address to bind the WebSocket listener to.
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "roomcast".to_string(),
            listen: ([0, 0, 0, 0], 3002).into(),
        }
    }
}

/// Backing store configuration.
///
/// With no `url`, the relay runs single-replica: presence lives in
/// process memory and membership events loop back locally.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store URL (e.g., "redis://redis.internal:6379").
    pub url: Option<String>,
    /// Maximum attempts for a presence write/delete.
    pub retry_attempts: u32,
    /// Fixed pause between retry attempts, in milliseconds. Must not be
    /// zero; a brief pause lets a primary failover settle.
    pub retry_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            retry_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// HTTP port for /metrics and /healthz. 0 disables the endpoint
    /// (used by tests).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

/// WebSocket handshake configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Allowed Origin header values. Empty allows all origins.
    pub allow_origins: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does
    /// not exist. Parse errors in an existing file are still fatal.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
