//! Explicit observer list with deterministic unsubscribe.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use relaydesk_types::unread::UnreadUpdate;
use tokio::sync::mpsc;
use tracing::warn;

pub type UnreadCallback = Arc<dyn Fn(&UnreadUpdate) + Send + Sync>;

/// Handle returned by [`ObserverList::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct ObserverList {
    next: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, UnreadCallback)>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&UnreadUpdate) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Subscribe through a channel. The caller must still unsubscribe.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<UnreadUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |update| {
            let _ = tx.send(*update);
        });
        (id, rx)
    }

    /// Returns `false` if the id was unknown (already removed).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Call every observer once. A panicking observer is logged and skipped.
    pub fn notify(&self, update: &UnreadUpdate) {
        let observers: Vec<(SubscriptionId, UnreadCallback)> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, callback) in observers {
            if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
                warn!(
                    subscription = id.0,
                    conversation_id = %update.conversation_id,
                    "unread observer panicked"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList").field("observers", &self.len()).finish()
    }
}
