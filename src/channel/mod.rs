// Realtime channel: one logical push connection with reconnection and heartbeat

mod driver;
mod manager;
mod state;


pub use manager::ChannelManager;
pub use state::ChannelState;

use crate::registry::{LifecycleObservers, SubscriberRegistry};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU32};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Reconnection and keep-alive tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Consecutive failed attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Fixed delay between attempts (no exponential growth)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Keep-alive interval while connected
    #[serde(default = "default_heartbeat_period_ms")]
    pub heartbeat_period_ms: u64,
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_heartbeat_period_ms() -> u64 {
    30_000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            heartbeat_period_ms: default_heartbeat_period_ms(),
        }
    }
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Never zero; a zero interval would spin
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms.max(1))
    }
}

/// State visible to both the public handle and the driver task
pub(crate) struct Shared {
    state: watch::Sender<ChannelState>,
    reconnect_attempt: AtomicU32,
    manual_close: AtomicBool,
    registry: SubscriberRegistry,
    observers: LifecycleObservers,
}

impl Shared {
    fn new() -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            state,
            reconnect_attempt: AtomicU32::new(0),
            manual_close: AtomicBool::new(false),
            registry: SubscriberRegistry::new(),
            observers: LifecycleObservers::new(),
        }
    }

    fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ChannelState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "Channel state changed");
            *current = next;
            true
        });
    }
}
