use super::{Connector, Transport, TransportEvent};
use crate::endpoint::Endpoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Close code reported when the socket fails without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

/// Production connector over tokio-tungstenite
pub struct WebSocketConnector {
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        let mut request = endpoint
            .url
            .as_str()
            .into_client_request()
            .context("Invalid channel address")?;

        if let Some(value) = &endpoint.auth_header {
            let value = HeaderValue::from_str(value).context("Invalid authorization header")?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = timeout(self.handshake_timeout, connect_async(request))
            .await
            .context("WebSocket handshake timed out")?
            .context("WebSocket handshake failed")?;

        debug!(status = %response.status(), url = %endpoint, "WebSocket handshake complete");

        Ok(Box::new(WebSocketTransport {
            stream,
            failed: false,
        }))
    }
}

struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Set after a read error; the next poll reports the abnormal closure
    failed: bool,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn next_event(&mut self) -> TransportEvent {
        if self.failed {
            return TransportEvent::Closed {
                code: Some(ABNORMAL_CLOSURE),
                reason: "connection failed".to_string(),
            };
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text.to_string()),
                // The protocol is text-only
                Some(Ok(Message::Binary(bytes))) => {
                    warn!(len = bytes.len(), "Dropping binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return TransportEvent::Closed { code, reason };
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.failed = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    return TransportEvent::Closed {
                        code: Some(ABNORMAL_CLOSURE),
                        reason: "stream ended".to_string(),
                    }
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .context("Failed to send frame")
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .context("Failed to close WebSocket")
    }
}
