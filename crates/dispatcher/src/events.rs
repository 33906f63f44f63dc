//! Lifecycle events
//!
//! Typed notifications published on a broadcast channel. Sending never
//! blocks and is a no-op when nobody subscribed.

use tokio::sync::broadcast;
use tracing::trace;

/// Dispatch lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// An adapter finished its one-time setup and joined the registry
    AdapterInitialized { version: String },
    /// A stack was compiled and inserted into the cache
    StackCompiled { key: String, stages: Vec<String> },
    /// The cache was cleared by a reconfiguration
    StacksInvalidated { dropped: usize },
}

/// Cloneable handle to the lifecycle channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DispatchEvent) {
        if self.tx.send(event).is_err() {
            trace!("lifecycle event dropped, no subscribers");
        }
    }
}
