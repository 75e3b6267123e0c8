//! Gateway - TCP listener that accepts incoming WebSocket connections.
//!
//! The Gateway binds one socket and spawns a Connection task per
//! accepted client. The WebSocket handshake carries two things the
//! relay cares about: the Origin header (checked against the configured
//! allow list) and an optional `client_id` query parameter naming the
//! client's durable identity.

use crate::config::WebSocketConfig;
use crate::network::Connection;
use crate::state::Relay;
use roomcast_proto::ClientId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tracing::{error, info, instrument, warn};

/// The Gateway accepts incoming connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    ws_config: WebSocketConfig,
    relay: Arc<Relay>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        ws_config: WebSocketConfig,
        relay: Arc<Relay>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");
        Ok(Self {
            listener,
            ws_config,
            relay,
        })
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let relay = Arc::clone(&self.relay);
                    let allowed = self.ws_config.allow_origins.clone();

                    tokio::spawn(async move {
                        // The handshake callback both validates the
                        // Origin header and extracts the client_id
                        // query parameter.
                        let mut requested_id: Option<String> = None;
                        let callback = |req: &http::Request<()>, response: http::Response<()>| {
                            requested_id = client_id_param(req.uri().query());

                            // An empty allow list allows all origins.
                            if allowed.is_empty() {
                                return Ok(response);
                            }
                            if let Some(origin) =
                                req.headers().get("Origin").and_then(|o| o.to_str().ok())
                            {
                                if allowed.iter().any(|a| a == origin || a == "*") {
                                    return Ok(response);
                                }
                                warn!(%addr, origin = %origin, "WebSocket CORS rejected");
                            }

                            Err(http::Response::builder()
                                .status(http::StatusCode::FORBIDDEN)
                                .body(Some("CORS origin not allowed".to_string()))
                                .unwrap())
                        };

                        // Bind before matching so the handshake future
                        // (which borrows requested_id) is dropped first.
                        let handshake = accept_hdr_async(stream, callback).await;
                        match handshake {
                            Ok(ws_stream) => {
                                // Fall back to a fresh identity when the
                                // client didn't name one.
                                let conn = ClientId::from(
                                    requested_id
                                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                                );
                                info!(id = %conn, %addr, "WebSocket connection accepted");
                                let connection =
                                    Connection::new(conn.clone(), ws_stream, addr, relay);
                                if let Err(e) = connection.run().await {
                                    error!(id = %conn, %addr, error = %e, "connection error");
                                }
                                info!(id = %conn, %addr, "connection closed");
                            }
                            Err(e) => {
                                warn!(%addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Extract the `client_id` query parameter from a request query string.
fn client_id_param(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "client_id")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_param_is_extracted_from_the_query_string() {
        assert_eq!(
            client_id_param(Some("client_id=abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(
            client_id_param(Some("foo=1&client_id=abc&bar=2")),
            Some("abc".to_string())
        );
        assert_eq!(client_id_param(Some("client_id=")), None);
        assert_eq!(client_id_param(Some("other=1")), None);
        assert_eq!(client_id_param(None), None);
    }
}
