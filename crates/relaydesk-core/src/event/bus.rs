//! Broadcast change feed for distributing `ChangeEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `ChangeFeed` supports multiple
//! concurrent subscribers. Publishing with no active subscribers is a no-op.
//! Store implementations own one and publish after each committed write.

use relaydesk_types::message::ChangeEvent;
use tokio::sync::broadcast;

/// Multi-consumer feed of message row changes.
///
/// Wraps a `tokio::sync::broadcast` channel. Cloning the feed clones the
/// sender, allowing multiple producers and consumers.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a new change feed with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change to all current subscribers.
    ///
    /// If there are no subscribers, the change is silently dropped.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for ChangeFeed {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
