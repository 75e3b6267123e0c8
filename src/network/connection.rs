//! Per-connection task: owns the WebSocket and the outgoing event
//! queue.
//!
//! Each connection runs one task that multiplexes two sources: frames
//! arriving from the client, and server events queued by the apply
//! task. Teardown always runs, whatever ended the loop, so a dropped
//! socket and a clean close leave the same state behind.

use crate::error::RelayError;
use crate::session;
use crate::state::{OUTGOING_QUEUE_SIZE, Relay};
use crate::telemetry::spans;
use futures_util::{SinkExt, StreamExt};
use roomcast_proto::{ClientId, ProtocolError, decode_client_event, encode_server_event};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{Instrument, debug, warn};

/// A single client connection.
pub struct Connection {
    conn: ClientId,
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    relay: Arc<Relay>,
}

impl Connection {
    pub fn new(
        conn: ClientId,
        ws: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        relay: Arc<Relay>,
    ) -> Self {
        Self {
            conn,
            ws,
            addr,
            relay,
        }
    }

    /// Drive the connection until the client goes away.
    pub async fn run(self) -> Result<(), RelayError> {
        let span = spans::connection(self.conn.as_str(), &self.addr);
        self.serve().instrument(span).await
    }

    async fn serve(self) -> Result<(), RelayError> {
        let Self {
            conn, ws, relay, ..
        } = self;

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);
        relay.register_sender(&conn, outgoing_tx.clone());
        session::on_connect(&relay, &conn).await;

        let (mut sink, mut stream) = ws.split();

        let result = loop {
            tokio::select! {
                // Events queued for this client by the apply task.
                event = outgoing_rx.recv() => {
                    let Some(event) = event else {
                        break Ok(());
                    };
                    let text = encode_server_event(&event);
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break Err(RelayError::from(e));
                    }
                }

                // Frames arriving from the client.
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match decode_client_event(&text) {
                                Ok(event) => {
                                    session::handle_client_event(&relay, &conn, event).await;
                                }
                                Err(e) => {
                                    // Malformed input never tears down
                                    // the connection.
                                    warn!(error = %e, "discarding malformed client frame");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("client closed");
                            break Ok(());
                        }
                        Some(Ok(Message::Binary(_))) => {
                            // Binary frames are not part of the vocabulary.
                            let e = ProtocolError::UnsupportedFrame("binary");
                            warn!(error = %e, "discarding client frame");
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are handled by the protocol layer.
                        }
                        Some(Err(e)) => {
                            break Err(RelayError::from(e));
                        }
                    }
                }
            }
        };

        // Release state only if this connection still owns the
        // identity; a reconnect under the same client_id hands the
        // memberships and presence record to the successor.
        if relay.unregister_sender_if(&conn, &outgoing_tx) {
            session::on_disconnecting(&relay, &conn).await;
        } else {
            session::on_superseded(&conn);
        }
        result
    }
}
