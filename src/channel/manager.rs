use super::driver::{Command, Driver};
use super::{ChannelConfig, ChannelState, Shared};
use crate::config::LabwatchConfig;
use crate::endpoint::{EndpointBuilder, TargetId};
use crate::notify::{Notifier, TracingNotifier};
use crate::protocol::{InboundFrame, MessageKind};
use crate::registry::{Lifecycle, ListenerId};
use crate::transport::{Connector, WebSocketConnector};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Owns one realtime channel for the lifetime of the application.
///
/// Construct it once at startup and hand references to whatever needs live
/// data. Every method except `shutdown` returns immediately; outcomes are
/// reported through listeners, lifecycle observers and `state_changes`.
///
/// Must be created inside a Tokio runtime: the connection is driven by a
/// spawned task.
pub struct ChannelManager {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ChannelManager {
    /// Start the driver task with explicit collaborators
    pub fn spawn(
        config: ChannelConfig,
        endpoints: EndpointBuilder,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let shared = Arc::new(Shared::new());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let driver = Driver::new(
            Arc::clone(&shared),
            config,
            endpoints,
            connector,
            notifier,
            command_rx,
        );
        let task = tokio::spawn(driver.run());

        Self {
            shared,
            commands,
            task: Some(task),
        }
    }

    /// Production wiring: WebSocket transport, log-only notifier
    pub fn from_config(config: &LabwatchConfig) -> Result<Self> {
        let endpoints = config
            .endpoint_builder()
            .context("Invalid realtime endpoint configuration")?;

        Ok(Self::spawn(
            config.channel.clone(),
            endpoints,
            Arc::new(WebSocketConnector::new()),
            Arc::new(TracingNotifier),
        ))
    }

    /// Open the channel for `target`. No-op if already connecting or
    /// connected to the same target; re-targets otherwise.
    pub fn connect(&self, target: TargetId) {
        self.command(Command::Connect(target));
    }

    /// Close the channel and suppress reconnection until the next `connect`.
    /// Safe to call repeatedly.
    pub fn close(&self) {
        // Visible immediately, ahead of the queued command
        self.shared.manual_close.store(true, Ordering::SeqCst);
        self.command(Command::Close);
    }

    /// Serialize and transmit `message` if connected.
    ///
    /// Returns false (and logs) when there is no open connection. Nothing is
    /// queued for later delivery.
    pub fn send<T: Serialize>(&self, message: &T) -> bool {
        let state = self.state();
        if state != ChannelState::Connected {
            warn!(state = %state, "Realtime channel not connected, message dropped");
            return false;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound message");
                return false;
            }
        };

        self.command(Command::Send(text))
    }

    /// Register `callback` for frames of `kind`. Any kind is accepted, known
    /// or not. Callbacks run on the driver task and should not block.
    pub fn on<F>(&self, kind: impl Into<MessageKind>, callback: F) -> ListenerId
    where
        F: Fn(&Value, &InboundFrame) -> Result<()> + Send + Sync + 'static,
    {
        self.shared.registry.on(kind.into(), Arc::new(callback))
    }

    /// Like `on`, but decodes `data` into `T` first. A payload that does not
    /// decode counts as a failed listener for that frame.
    pub fn subscribe_typed<T, F>(&self, kind: impl Into<MessageKind>, callback: F) -> ListenerId
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &InboundFrame) -> Result<()> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let type_name = std::any::type_name::<T>();
        self.on(kind, move |data: &Value, frame: &InboundFrame| {
            let payload = T::deserialize(data)
                .with_context(|| format!("{} payload is not a valid {}", frame.kind, type_name))?;
            callback(payload, frame)
        })
    }

    /// Remove a registration made with `on` / `subscribe_typed`
    pub fn off(&self, kind: impl Into<MessageKind>, id: ListenerId) -> bool {
        self.shared.registry.off(&kind.into(), id)
    }

    pub fn on_connect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .observers
            .add(Lifecycle::Connected, Arc::new(callback))
    }

    pub fn on_disconnect<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .observers
            .add(Lifecycle::Disconnected, Arc::new(callback))
    }

    pub fn off_connect(&self, id: ListenerId) -> bool {
        self.shared.observers.remove(Lifecycle::Connected, id)
    }

    pub fn off_disconnect(&self, id: ListenerId) -> bool {
        self.shared.observers.remove(Lifecycle::Disconnected, id)
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// DISCONNECTED | CONNECTING | CONNECTED | CLOSING, or UNKNOWN once the
    /// driver task is gone
    pub fn status_text(&self) -> &'static str {
        if self.commands.is_closed() {
            return "UNKNOWN";
        }
        self.state().as_str()
    }

    /// Consecutive failed attempts since the last successful open
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.reconnect_attempt.load(Ordering::SeqCst)
    }

    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Close the channel and wait for the driver task to finish
    pub async fn shutdown(&mut self) {
        self.shared.manual_close.store(true, Ordering::SeqCst);
        self.command(Command::Shutdown);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Channel driver ended abnormally");
            }
        }
        debug!("Channel manager shut down");
    }

    fn command(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            warn!("Channel driver is not running");
            return false;
        }
        true
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
