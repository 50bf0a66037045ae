//! Latest-value progress broadcast.
//!
//! A `ProgressChannel` holds exactly one `ProgressUpdate`. Publishing replaces
//! it; a subscriber that reads after N publishes sees the Nth and nothing
//! earlier. Consumers that need every event implement [`ProgressSink`]
//! directly instead.

use std::sync::Arc;

use tokio::sync::watch;

use deepdive_common::ProgressUpdate;

/// Destination for progress snapshots emitted by a research run.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, update: ProgressUpdate);
}

#[derive(Clone)]
pub struct ProgressChannel {
    tx: Arc<watch::Sender<ProgressUpdate>>,
}

impl ProgressChannel {
    pub fn new(initial: ProgressUpdate) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// A receiver positioned at the current value.
    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> ProgressUpdate {
        self.tx.borrow().clone()
    }
}

impl ProgressSink for ProgressChannel {
    fn publish(&self, update: ProgressUpdate) {
        // send_replace stores the value even with no receivers alive.
        self.tx.send_replace(update);
    }
}
