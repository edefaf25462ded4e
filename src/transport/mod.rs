// Transport seam between the channel driver and the network

use crate::endpoint::Endpoint;
use anyhow::Result;
use async_trait::async_trait;

mod websocket;

pub use websocket::WebSocketConnector;

/// Something the peer did on an open connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One text payload
    Text(String),
    /// Transport-level error. Not terminal on its own; a `Closed` follows.
    Error(String),
    /// Connection is gone. No further events after this.
    Closed { code: Option<u16>, reason: String },
}

/// One open connection.
///
/// `next_event` must be cancel-safe: the driver polls it inside `select!`
/// alongside timers and commands.
#[async_trait]
pub trait Transport: Send {
    async fn next_event(&mut self) -> TransportEvent;

    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Initiate a graceful close. Errors are informational only.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections. The driver calls this once per attempt and treats an
/// `Err` exactly like a connection that closed before opening.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}
