//! Background task that owns the connection, the reconnect timer and the
//! heartbeat timer. All state transitions happen here, one event at a time;
//! the public `ChannelManager` only sends commands and reads shared state.

use super::{ChannelConfig, ChannelState, Shared};
use crate::endpoint::{EndpointBuilder, TargetId};
use crate::notify::{Notifier, RECONNECT_EXHAUSTED_MESSAGE};
use crate::protocol::{InboundFrame, OutboundFrame};
use crate::registry::{Dispatch, Lifecycle};
use crate::transport::{Connector, Transport, TransportEvent};
use anyhow::Result;
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Upper bound on waiting for a graceful close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest raw payload echoed into a malformed-frame log line
const MAX_LOGGED_PAYLOAD: usize = 200;

pub(super) enum Command {
    Connect(TargetId),
    Close,
    Send(String),
    Shutdown,
}

type PendingHandshake = Pin<Box<dyn Future<Output = Result<Box<dyn Transport>>> + Send>>;

pub(super) struct Driver {
    shared: Arc<Shared>,
    config: ChannelConfig,
    endpoints: EndpointBuilder,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notifier>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Target of the current or most recent attempt
    target: Option<TargetId>,
    handshake: Option<PendingHandshake>,
    transport: Option<Box<dyn Transport>>,
    /// Armed iff state == Connected
    heartbeat: Option<Interval>,
    /// Pending reconnect deadline; at most one
    reconnect_at: Option<Instant>,
}

impl Driver {
    pub(super) fn new(
        shared: Arc<Shared>,
        config: ChannelConfig,
        endpoints: EndpointBuilder,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            shared,
            config,
            endpoints,
            connector,
            notifier,
            commands,
            target: None,
            handshake: None,
            transport: None,
            heartbeat: None,
            reconnect_at: None,
        }
    }

    pub(super) async fn run(mut self) {
        debug!("Channel driver started");

        loop {
            tokio::select! {
                // Commands first so close() preempts timers and in-flight events
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Connect(target)) => self.connect(target).await,
                    Some(Command::Close) => self.close().await,
                    Some(Command::Send(text)) => self.send(text).await,
                    Some(Command::Shutdown) | None => {
                        self.close().await;
                        break;
                    }
                },

                result = wait_handshake(&mut self.handshake) => {
                    self.handshake = None;
                    self.on_handshake(result);
                }

                event = next_event(&mut self.transport) => self.on_transport_event(event),

                _ = wait_tick(&mut self.heartbeat) => self.send_heartbeat().await,

                _ = wait_deadline(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.on_reconnect_timer();
                }
            }
        }

        debug!("Channel driver stopped");
    }

    async fn connect(&mut self, target: TargetId) {
        self.shared.manual_close.store(false, Ordering::SeqCst);

        let state = self.shared.state();
        if state.is_live() {
            if self.target == Some(target) {
                debug!(target_id = %target, state = %state, "Channel already live, ignoring connect");
                return;
            }

            info!(
                from = ?self.target.map(TargetId::get),
                to = %target,
                "Switching channel target"
            );
            self.release_connection().await;
        }

        // An explicit connect supersedes any pending retry
        self.reconnect_at = None;
        self.target = Some(target);
        self.open(target);
    }

    /// Start one connection attempt
    fn open(&mut self, target: TargetId) {
        let endpoint = match self.endpoints.build(target) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(target_id = %target, error = %e, "Cannot build channel endpoint");
                self.shared.set_state(ChannelState::Disconnected);
                self.schedule_reconnect();
                return;
            }
        };

        info!(target_id = %target, url = %endpoint, "Connecting realtime channel");
        self.shared.set_state(ChannelState::Connecting);

        let connector = Arc::clone(&self.connector);
        self.handshake = Some(Box::pin(async move { connector.connect(&endpoint).await }));
    }

    fn on_handshake(&mut self, result: Result<Box<dyn Transport>>) {
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                self.shared.reconnect_attempt.store(0, Ordering::SeqCst);
                self.shared.set_state(ChannelState::Connected);
                info!(target_id = ?self.target.map(TargetId::get), "Realtime channel connected");

                self.shared.observers.notify(Lifecycle::Connected);
                self.start_heartbeat();
            }
            Err(e) => {
                warn!(
                    target_id = ?self.target.map(TargetId::get),
                    error = %format!("{:#}", e),
                    "Realtime channel failed to open"
                );
                self.on_closed();
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Text(text) => self.on_text(&text),
            TransportEvent::Error(e) => {
                // The transport reports Closed next; that drives the transition
                warn!(error = %e, "Realtime channel transport error");
            }
            TransportEvent::Closed { code, reason } => {
                info!(code = ?code, reason = %reason, "Realtime channel closed by peer");
                self.on_closed();
            }
        }
    }

    fn on_text(&self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(frame) => {
                debug!(kind = %frame.kind, "Frame received");
                if let Dispatch::Delivered { failed, .. } = self.shared.registry.dispatch(&frame) {
                    if failed > 0 {
                        debug!(kind = %frame.kind, failed, "Some listeners failed");
                    }
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %truncate(text, MAX_LOGGED_PAYLOAD),
                    "Dropping malformed frame"
                );
            }
        }
    }

    /// Unexpected end of the current attempt or connection
    fn on_closed(&mut self) {
        self.transport = None;
        self.handshake = None;
        self.stop_heartbeat();
        self.shared.set_state(ChannelState::Disconnected);
        self.shared.observers.notify(Lifecycle::Disconnected);

        if self.shared.manual_close.load(Ordering::SeqCst) {
            return;
        }

        match self.target {
            Some(_) => self.schedule_reconnect(),
            None => debug!("No target to reconnect to"),
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.shared.manual_close.load(Ordering::SeqCst) || self.reconnect_at.is_some() {
            return;
        }

        let attempt = self.shared.reconnect_attempt.load(Ordering::SeqCst);
        if attempt >= self.config.max_reconnect_attempts {
            error!(
                attempts = attempt,
                target_id = ?self.target.map(TargetId::get),
                "Reconnection attempts exhausted"
            );
            self.notifier.notify_error(RECONNECT_EXHAUSTED_MESSAGE);
            return;
        }

        let attempt = attempt + 1;
        self.shared.reconnect_attempt.store(attempt, Ordering::SeqCst);
        info!(
            attempt,
            max_attempts = self.config.max_reconnect_attempts,
            delay_ms = self.config.reconnect_delay_ms,
            "Scheduling reconnection"
        );
        self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay());
    }

    fn on_reconnect_timer(&mut self) {
        if self.shared.manual_close.load(Ordering::SeqCst) {
            return;
        }

        if let Some(target) = self.target {
            debug!(target_id = %target, "Reconnect timer fired");
            self.open(target);
        }
    }

    async fn close(&mut self) {
        self.shared.manual_close.store(true, Ordering::SeqCst);
        self.reconnect_at = None;

        if self.release_connection().await {
            info!(target_id = ?self.target.map(TargetId::get), "Realtime channel closed by caller");
        } else {
            debug!("Close requested with no live connection");
        }
    }

    /// Tear down whatever attempt or connection is owned. Returns whether
    /// there was one; disconnect observers run only in that case.
    async fn release_connection(&mut self) -> bool {
        self.stop_heartbeat();
        let had_handshake = self.handshake.take().is_some();

        let had_transport = match self.transport.take() {
            Some(mut transport) => {
                self.shared.set_state(ChannelState::Closing);
                match timeout(CLOSE_TIMEOUT, transport.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Transport close reported an error"),
                    Err(_) => warn!("Timed out closing realtime channel"),
                }
                true
            }
            None => false,
        };

        self.shared.set_state(ChannelState::Disconnected);

        let released = had_handshake || had_transport;
        if released {
            self.shared.observers.notify(Lifecycle::Disconnected);
        }
        released
    }

    async fn send(&mut self, text: String) {
        let connected = self.shared.state() == ChannelState::Connected;
        match self.transport.as_mut() {
            Some(transport) if connected => {
                if let Err(e) = transport.send_text(text).await {
                    warn!(error = %format!("{:#}", e), "Failed to send frame");
                }
            }
            _ => warn!("Realtime channel not connected, dropping outbound frame"),
        }
    }

    fn start_heartbeat(&mut self) {
        let period = self.config.heartbeat_period();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Replaces (and thereby cancels) any previous ticker
        self.heartbeat = Some(ticker);
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat = None;
    }

    async fn send_heartbeat(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let ping = match serde_json::to_string(&OutboundFrame::ping()) {
            Ok(ping) => ping,
            Err(e) => {
                error!(error = %e, "Failed to encode heartbeat");
                return;
            }
        };

        debug!("Sending heartbeat");
        if let Err(e) = transport.send_text(ping).await {
            warn!(error = %format!("{:#}", e), "Heartbeat send failed");
        }
    }
}

async fn wait_handshake(handshake: &mut Option<PendingHandshake>) -> Result<Box<dyn Transport>> {
    match handshake {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn next_event(transport: &mut Option<Box<dyn Transport>>) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => pending().await,
    }
}

async fn wait_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
