// Realtime push channel for the lab monitoring dashboard

// Wire frames and payload models
pub mod protocol;

// Endpoint address construction
pub mod endpoint;

// Channel authentication
pub mod auth;

// Frame subscribers and lifecycle observers
pub mod registry;

// Connection transport (WebSocket)
pub mod transport;

// User-facing failure notifications
pub mod notify;

// Channel manager: connect, reconnect, heartbeat, dispatch
pub mod channel;

// TOML configuration
pub mod config;

pub use channel::{ChannelConfig, ChannelManager, ChannelState};
pub use endpoint::TargetId;
pub use protocol::{InboundFrame, MessageKind};
