//! Test WebSocket client.
//!
//! Speaks the relay's JSON event vocabulary over a real WebSocket
//! connection and asserts on received server events.

use futures_util::{SinkExt, StreamExt};
use roomcast_proto::{ClientEvent, FollowAction, ServerEvent, UserToFollow};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test client attached to a relay.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    client_id: String,
}

impl TestClient {
    /// Connect with a named identity.
    pub async fn connect(address: &str, client_id: &str) -> anyhow::Result<Self> {
        let url = format!("ws://{}/?client_id={}", address, client_id);
        let (ws, _response) = connect_async(url.as_str()).await?;
        Ok(Self {
            ws,
            client_id: client_id.to_string(),
        })
    }

    /// This client's identity, as the relay sees it.
    #[allow(dead_code)]
    pub fn id(&self) -> &str {
        &self.client_id
    }

    /// Send one client event.
    pub async fn send(&mut self, event: &ClientEvent) -> anyhow::Result<()> {
        let text = serde_json::to_string(event)?;
        self.ws.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Send a raw text frame, bypassing event encoding.
    #[allow(dead_code)]
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Receive a single server event.
    pub async fn recv(&mut self) -> anyhow::Result<ServerEvent> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive a server event with a timeout, skipping control frames.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerEvent> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let frame = timeout(remaining, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text)
                    .map_err(|e| anyhow::anyhow!("bad server event {text:?}: {e}"));
            }
        }
    }

    /// Assert that no event arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok(event) => anyhow::bail!("expected silence, got {event:?}"),
            Err(_) => Ok(()),
        }
    }

    /// Receive events until the predicate matches, returning everything
    /// received.
    #[allow(dead_code)]
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<ServerEvent>>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let mut events = Vec::new();
        loop {
            let event = self.recv().await?;
            let done = predicate(&event);
            events.push(event);
            if done {
                break;
            }
        }
        Ok(events)
    }

    /// Join a content room.
    #[allow(dead_code)]
    pub async fn join_room(&mut self, room: &str) -> anyhow::Result<()> {
        self.send(&ClientEvent::JoinRoom {
            room_id: room.to_string(),
        })
        .await
    }

    /// Broadcast an opaque payload to a room.
    pub async fn broadcast(
        &mut self,
        room: &str,
        payload: serde_json::Value,
        iv: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.send(&ClientEvent::ServerBroadcast {
            room_id: room.to_string(),
            payload,
            iv,
        })
        .await
    }

    /// Follow or unfollow another connection.
    #[allow(dead_code)]
    pub async fn follow(&mut self, target: &str, action: FollowAction) -> anyhow::Result<()> {
        self.send(&ClientEvent::UserFollow {
            user_to_follow: UserToFollow {
                client_id: target.into(),
                username: format!("user-{target}"),
            },
            action,
        })
        .await
    }

    /// Close the connection cleanly.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
