// Subscriber and lifecycle-observer registries

use crate::protocol::{InboundFrame, MessageKind};
use dashmap::DashMap;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};


/// Frame callback: receives the payload body and the whole decoded frame
pub type Listener = Arc<dyn Fn(&Value, &InboundFrame) -> anyhow::Result<()> + Send + Sync>;

/// Connect / disconnect callback
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by a registration, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Result of routing one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Kind is registered; `invoked` listeners ran, `failed` of them errored or panicked
    Delivered { invoked: usize, failed: usize },
    /// Nothing has ever been registered for this kind
    Unrecognized,
}

/// Maps a frame kind to its listeners in registration order.
///
/// Registering the same closure twice yields two entries and two calls per
/// frame; every `on` hands back a fresh id.
pub struct SubscriberRegistry {
    listeners: DashMap<MessageKind, Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        let listeners = DashMap::new();
        for kind in MessageKind::SEEDED {
            listeners.insert(kind, Vec::new());
        }

        Self {
            listeners,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn on(&self, kind: MessageKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(kind = %kind, "Listener registered");
        self.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Remove a registration. Unknown ids are ignored.
    pub fn off(&self, kind: &MessageKind, id: ListenerId) -> bool {
        let Some(mut entries) = self.listeners.get_mut(kind) else {
            return false;
        };

        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self, kind: &MessageKind) -> usize {
        self.listeners.get(kind).map(|e| e.len()).unwrap_or(0)
    }

    /// Route a frame to every listener for its kind.
    ///
    /// Listeners run against a snapshot taken before the first call, so a
    /// listener may (un)register itself or others without affecting this
    /// round. The shard lock is released before any listener runs.
    pub fn dispatch(&self, frame: &InboundFrame) -> Dispatch {
        let snapshot: Vec<Listener> = match self.listeners.get(&frame.kind) {
            Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => {
                warn!(kind = %frame.kind, "Unrecognized frame kind, dropping");
                return Dispatch::Unrecognized;
            }
        };

        let mut failed = 0;
        for listener in &snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&frame.data, frame)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    error!(kind = %frame.kind, error = %e, "Listener failed");
                }
                Err(_) => {
                    failed += 1;
                    error!(kind = %frame.kind, "Listener panicked");
                }
            }
        }

        Dispatch::Delivered {
            invoked: snapshot.len(),
            failed,
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// "Became connected" / "became disconnected" callbacks
pub struct LifecycleObservers {
    connected: RwLock<Vec<(ListenerId, Observer)>>,
    disconnected: RwLock<Vec<(ListenerId, Observer)>>,
    next_id: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Connected,
    Disconnected,
}

impl LifecycleObservers {
    pub fn new() -> Self {
        Self {
            connected: RwLock::new(Vec::new()),
            disconnected: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, event: Lifecycle, observer: Observer) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut list = self.list(event).write().unwrap_or_else(|e| e.into_inner());
        list.push((id, observer));
        id
    }

    pub fn remove(&self, event: Lifecycle, id: ListenerId) -> bool {
        let mut list = self.list(event).write().unwrap_or_else(|e| e.into_inner());
        match list.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Run every observer for `event`; a panicking observer does not stop the rest.
    /// Returns how many ran.
    pub fn notify(&self, event: Lifecycle) -> usize {
        let snapshot: Vec<Observer> = {
            let list = self.list(event).read().unwrap_or_else(|e| e.into_inner());
            list.iter().map(|(_, o)| Arc::clone(o)).collect()
        };

        for observer in &snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| observer())).is_err() {
                error!(event = ?event, "Lifecycle observer panicked");
            }
        }

        snapshot.len()
    }

    fn list(&self, event: Lifecycle) -> &RwLock<Vec<(ListenerId, Observer)>> {
        match event {
            Lifecycle::Connected => &self.connected,
            Lifecycle::Disconnected => &self.disconnected,
        }
    }
}

impl Default for LifecycleObservers {
    fn default() -> Self {
        Self::new()
    }
}
