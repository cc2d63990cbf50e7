//! UnreadEngine: per-conversation unread state driven by the message change feed.
//!
//! State lives in an in-memory map mirrored to a durable snapshot store after
//! every mutation. Work on one conversation (fetch, apply, snapshot, notify)
//! runs one at a time; different conversations never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::RepositoryError;
use relaydesk_types::message::{ChangeEvent, ChangeKind, Message, SenderRole};
use relaydesk_types::unread::{UnreadSnapshot, UnreadState, UnreadUpdate};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::compute::{compute_unread, Watermarks};
use super::observer::{ObserverList, SubscriptionId};
use crate::relay::keyed::KeyedLock;
use crate::repository::SortOrder;
use crate::repository::message::{MessageFilter, MessageStore};
use crate::repository::unread_snapshot::UnreadSnapshotStore;

#[derive(Debug, Clone, Copy)]
struct Entry {
    state: UnreadState,
    read_through: Option<DateTime<Utc>>,
    cached_at: DateTime<Utc>,
    /// Bumped by every write; lets a batch detect writes that raced its query.
    version: u64,
}

impl Entry {
    fn watermarks(&self) -> Watermarks {
        Watermarks {
            last_response: self.state.last_response_at,
            read_through: self.read_through,
        }
    }
}

/// Whether an unchanged state still produces a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notify {
    Always,
    OnChange,
}

struct EngineInner<S, K> {
    store: Arc<S>,
    snapshots: Arc<K>,
    entries: Mutex<HashMap<ConversationId, Entry>>,
    turns: KeyedLock<ConversationId>,
    versions: AtomicU64,
    horizon: chrono::Duration,
    observers: ObserverList,
}

/// Unread counter for every conversation. Cheap to clone.
pub struct UnreadEngine<S, K> {
    inner: Arc<EngineInner<S, K>>,
}

impl<S, K> Clone for UnreadEngine<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S, K> UnreadEngine<S, K>
where
    S: MessageStore + 'static,
    K: UnreadSnapshotStore + 'static,
{
    /// `horizon` bounds how long a cached or snapshotted state is served.
    pub fn new(store: Arc<S>, snapshots: Arc<K>, horizon: chrono::Duration) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                snapshots,
                entries: Mutex::new(HashMap::new()),
                turns: KeyedLock::new(),
                versions: AtomicU64::new(0),
                horizon,
                observers: ObserverList::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current unread count, recomputed from the store.
    pub async fn get_unread_count(&self, conversation_id: ConversationId) -> Result<u32, RepositoryError> {
        Ok(self.refresh(conversation_id).await?.count)
    }

    /// Recompute one conversation from the store and return its state.
    ///
    /// Observers hear about it only if the state changed.
    pub async fn refresh(&self, conversation_id: ConversationId) -> Result<UnreadState, RepositoryError> {
        self.recompute(conversation_id, Notify::OnChange).await
    }

    /// Unread counts for many conversations from a single store query.
    ///
    /// Gives the same answer per id as [`Self::get_unread_count`].
    pub async fn get_all_unread_counts(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, u32>, RepositoryError> {
        Ok(self
            .get_all_states(conversation_ids)
            .await?
            .into_iter()
            .map(|(id, state)| (id, state.count))
            .collect())
    }

    /// Full states for many conversations from a single store query.
    ///
    /// A conversation written while the query was in flight keeps its newer
    /// state; the batch reports that state instead of its own older result.
    pub async fn get_all_states(
        &self,
        conversation_ids: &[ConversationId],
    ) -> Result<HashMap<ConversationId, UnreadState>, RepositoryError> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let seen: HashMap<ConversationId, Option<u64>> = {
            let entries = self.lock_entries();
            conversation_ids
                .iter()
                .map(|id| (*id, entries.get(id).map(|e| e.version)))
                .collect()
        };

        let messages = self
            .inner
            .store
            .query(&MessageFilter::conversations(conversation_ids), SortOrder::Asc)
            .await?;

        let mut grouped: HashMap<ConversationId, Vec<Message>> =
            conversation_ids.iter().map(|id| (*id, Vec::new())).collect();
        for message in messages {
            if let Some(group) = grouped.get_mut(&message.conversation_id) {
                group.push(message);
            }
        }

        let mut states = HashMap::with_capacity(grouped.len());
        for (conversation_id, group) in grouped {
            let _turn = self.inner.turns.lock(conversation_id).await;
            let before = seen.get(&conversation_id).copied().flatten();
            let newer = self
                .lock_entries()
                .get(&conversation_id)
                .filter(|e| Some(e.version) != before)
                .map(|e| e.state);
            let state = match newer {
                Some(state) => {
                    debug!(%conversation_id, "state changed during batch query, keeping it");
                    state
                }
                None => {
                    let state = compute_unread(&group, self.watermarks(conversation_id));
                    self.apply(conversation_id, state, None, Notify::OnChange).await;
                    state
                }
            };
            states.insert(conversation_id, state);
        }
        debug!(conversations = states.len(), "batch unread recompute");
        Ok(states)
    }

    /// Cached state if present and inside the freshness horizon.
    pub fn cached_state(&self, conversation_id: ConversationId) -> Option<UnreadState> {
        let now = Utc::now();
        self.lock_entries()
            .get(&conversation_id)
            .filter(|e| now.signed_duration_since(e.cached_at) < self.inner.horizon)
            .map(|e| e.state)
    }

    /// Cached count; absent or stale entries read as zero.
    pub fn cached_count(&self, conversation_id: ConversationId) -> u32 {
        self.cached_state(conversation_id).map(|s| s.count).unwrap_or(0)
    }

    pub fn cached_last_message_time(&self, conversation_id: ConversationId) -> Option<DateTime<Utc>> {
        self.cached_state(conversation_id).and_then(|s| s.last_message_at)
    }

    pub fn cached_last_response_time(&self, conversation_id: ConversationId) -> Option<DateTime<Utc>> {
        self.cached_state(conversation_id).and_then(|s| s.last_response_at)
    }

    /// Conversations the engine currently holds state for.
    pub fn tracked_conversations(&self) -> Vec<ConversationId> {
        let mut ids: Vec<_> = self.lock_entries().keys().copied().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// An operator response was linked at `at`: the conversation is read.
    ///
    /// Authoritative, no rescan. The response time never moves backwards.
    pub async fn record_response(&self, conversation_id: ConversationId, at: DateTime<Utc>) -> UnreadState {
        let _turn = self.inner.turns.lock(conversation_id).await;
        let current = self.current(conversation_id);
        let state = UnreadState {
            count: 0,
            last_message_at: current.state.last_message_at,
            last_response_at: current.state.last_response_at.max(Some(at)),
        };
        self.apply(conversation_id, state, None, Notify::Always).await;
        info!(%conversation_id, "operator response recorded");
        state
    }

    /// The conversation was opened by a viewer. The response time is kept.
    pub async fn mark_as_read(&self, conversation_id: ConversationId) -> UnreadState {
        let _turn = self.inner.turns.lock(conversation_id).await;
        let current = self.current(conversation_id);
        let state = UnreadState {
            count: 0,
            ..current.state
        };
        let read_through = current.state.last_message_at.max(current.read_through);
        self.apply(conversation_id, state, read_through, Notify::Always).await;
        debug!(%conversation_id, "marked as read");
        state
    }

    /// React to one change-feed event.
    pub async fn handle_change(&self, change: &ChangeEvent) -> Result<(), RepositoryError> {
        let conversation_id = change.conversation_id();
        match change.kind {
            ChangeKind::Insert => {
                if change.new.sender == SenderRole::User && !change.new.body.trim().is_empty() {
                    self.recompute(conversation_id, Notify::Always).await?;
                }
            }
            ChangeKind::Update => {
                let old = change.old.as_ref();
                let newly_responded =
                    change.new.has_response() && !old.is_some_and(Message::has_response);
                if newly_responded {
                    let at = change.new.responded_at.unwrap_or_else(Utc::now);
                    self.record_response(conversation_id, at).await;
                } else if old.is_some_and(|old| old.body != change.new.body) {
                    self.recompute(conversation_id, Notify::Always).await?;
                } else {
                    debug!(%conversation_id, message_id = %change.new.id, "ignoring unrelated update");
                }
            }
        }
        Ok(())
    }

    /// Drop all in-memory and persisted state.
    pub async fn clear_cache(&self) -> Result<(), RepositoryError> {
        self.lock_entries().clear();
        self.inner.snapshots.clear().await?;
        info!("unread cache cleared");
        Ok(())
    }

    /// Load fresh snapshots into memory. Stale ones are skipped silently.
    pub async fn warm_from_snapshots(&self) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let snapshots = self.inner.snapshots.load_all().await?;
        let mut entries = self.lock_entries();
        let mut loaded = 0;
        for snapshot in snapshots {
            if !snapshot.is_fresh(now, self.inner.horizon) {
                continue;
            }
            entries.entry(snapshot.conversation_id).or_insert(Entry {
                state: snapshot.state,
                read_through: None,
                cached_at: snapshot.cached_at,
                version: self.next_version(),
            });
            loaded += 1;
        }
        info!(loaded, "unread snapshots loaded");
        Ok(loaded)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&UnreadUpdate) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(callback)
    }

    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<UnreadUpdate>) {
        self.inner.observers.subscribe_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Consume the store's change feed until `shutdown` fires or the feed closes.
    ///
    /// A lagging receiver has missed events, so every tracked conversation
    /// is recomputed from the store.
    pub fn spawn_change_feed(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let mut changes = self.inner.store.subscribe_changes();
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = changes.recv() => match received {
                        Ok(change) => {
                            if let Err(e) = engine.handle_change(&change).await {
                                warn!(
                                    conversation_id = %change.conversation_id(),
                                    error = %e,
                                    "unread recompute failed"
                                );
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "change feed lagged, refreshing tracked conversations");
                            engine.refresh_tracked().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("unread change feed consumer stopped");
        })
    }

    async fn refresh_tracked(&self) {
        for conversation_id in self.tracked_conversations() {
            if let Err(e) = self.recompute(conversation_id, Notify::Always).await {
                warn!(%conversation_id, error = %e, "unread refresh failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn recompute(&self, conversation_id: ConversationId, notify: Notify) -> Result<UnreadState, RepositoryError> {
        let _turn = self.inner.turns.lock(conversation_id).await;
        let messages = self
            .inner
            .store
            .query(&MessageFilter::conversation(conversation_id), SortOrder::Asc)
            .await?;
        let state = compute_unread(&messages, self.watermarks(conversation_id));
        self.apply(conversation_id, state, None, notify).await;
        Ok(state)
    }

    /// Store `state`, persist its snapshot and notify observers.
    async fn apply(
        &self,
        conversation_id: ConversationId,
        state: UnreadState,
        read_through: Option<DateTime<Utc>>,
        notify: Notify,
    ) {
        let now = Utc::now();
        let changed = {
            let mut entries = self.lock_entries();
            let previous = entries.get(&conversation_id).copied();
            entries.insert(
                conversation_id,
                Entry {
                    state,
                    read_through: read_through.or(previous.and_then(|p| p.read_through)),
                    cached_at: now,
                    version: self.next_version(),
                },
            );
            previous.is_none_or(|p| p.state != state)
        };

        let snapshot = UnreadSnapshot {
            conversation_id,
            state,
            cached_at: now,
        };
        if let Err(e) = self.inner.snapshots.save(&snapshot).await {
            warn!(%conversation_id, error = %e, "failed to persist unread snapshot");
        }

        if changed || notify == Notify::Always {
            self.inner.observers.notify(&UnreadUpdate {
                conversation_id,
                count: state.count,
                last_message_time: state.last_message_at,
            });
        }
    }

    fn current(&self, conversation_id: ConversationId) -> Entry {
        self.lock_entries()
            .get(&conversation_id)
            .copied()
            .unwrap_or(Entry {
                state: UnreadState::default(),
                read_through: None,
                cached_at: Utc::now(),
                version: 0,
            })
    }

    fn next_version(&self) -> u64 {
        self.inner.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn watermarks(&self, conversation_id: ConversationId) -> Watermarks {
        self.lock_entries()
            .get(&conversation_id)
            .map(Entry::watermarks)
            .unwrap_or_default()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationId, Entry>> {
        self.inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, K> std::fmt::Debug for UnreadEngine<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadEngine")
            .field("horizon", &self.inner.horizon)
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{t, InMemoryMessageStore, InMemorySnapshots};
    use relaydesk_types::message::NewMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type TestEngine = UnreadEngine<InMemoryMessageStore, InMemorySnapshots>;

    fn engine() -> (TestEngine, Arc<InMemoryMessageStore>, Arc<InMemorySnapshots>) {
        let store = Arc::new(InMemoryMessageStore::default());
        let snapshots = Arc::new(InMemorySnapshots::default());
        let engine = UnreadEngine::new(store.clone(), snapshots.clone(), chrono::Duration::minutes(5));
        (engine, store, snapshots)
    }

    fn counter(engine: &TestEngine) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        engine.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[tokio::test]
    async fn n_inbound_messages_count_n() {
        let (engine, store, _) = engine();
        for i in 0..4 {
            store.seed(1, SenderRole::User, &format!("m{i}"), t(i));
        }
        assert_eq!(engine.get_unread_count(ConversationId(1)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn response_then_new_message_scenario() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        for i in 1..=3 {
            let m = store.seed(1, SenderRole::User, "help", t(i));
            engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        }
        assert_eq!(engine.cached_count(c1), 3);

        engine.record_response(c1, t(4)).await;
        assert_eq!(engine.cached_count(c1), 0);
        assert_eq!(engine.cached_last_response_time(c1), Some(t(4)));

        let m5 = store.seed(1, SenderRole::User, "again", t(5));
        engine.handle_change(&ChangeEvent::inserted(m5)).await.unwrap();
        assert_eq!(engine.cached_count(c1), 1);
        assert_eq!(engine.cached_last_message_time(c1), Some(t(5)));
    }

    #[tokio::test]
    async fn unrelated_update_after_response_keeps_zero() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        let m = store.seed(1, SenderRole::User, "help", t(1));
        engine.record_response(c1, t(2)).await;

        // Same content, no new response linkage.
        engine
            .handle_change(&ChangeEvent::updated(m.clone(), m))
            .await
            .unwrap();
        assert_eq!(engine.cached_count(c1), 0);
    }

    #[tokio::test]
    async fn update_that_links_response_resets_count() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        let old = store.seed(1, SenderRole::User, "help", t(1));
        engine.refresh(c1).await.unwrap();
        assert_eq!(engine.cached_count(c1), 1);

        let mut new = old.clone();
        new.response = Some("on it".into());
        new.responded_at = Some(t(3));
        engine.handle_change(&ChangeEvent::updated(old, new)).await.unwrap();

        assert_eq!(engine.cached_count(c1), 0);
        assert_eq!(engine.cached_last_response_time(c1), Some(t(3)));
    }

    #[tokio::test]
    async fn content_edit_triggers_recompute() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        let m = store.seed(1, SenderRole::User, "  ", t(1));
        engine.refresh(c1).await.unwrap();
        assert_eq!(engine.cached_count(c1), 0);

        let mut rx = store.subscribe_changes();
        store.edit_body(m.id, "now with text");
        let change = rx.recv().await.unwrap();
        engine.handle_change(&change).await.unwrap();
        assert_eq!(engine.cached_count(c1), 1);
    }

    #[tokio::test]
    async fn mark_as_read_keeps_response_time() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        store.seed(1, SenderRole::User, "a", t(1));
        engine.record_response(c1, t(2)).await;
        store.seed(1, SenderRole::User, "b", t(3));
        assert_eq!(engine.refresh(c1).await.unwrap().count, 1);

        let state = engine.mark_as_read(c1).await;
        assert_eq!(state.count, 0);
        assert_eq!(state.last_response_at, Some(t(2)));

        // Acknowledged messages stay read; only later ones count.
        assert_eq!(engine.refresh(c1).await.unwrap().count, 0);
        let m = store.seed(1, SenderRole::User, "c", t(4));
        engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        assert_eq!(engine.cached_count(c1), 1);
    }

    #[tokio::test]
    async fn batch_matches_single_path() {
        let (engine, store, _) = engine();
        store.seed(1, SenderRole::User, "a", t(1));
        store.seed(1, SenderRole::User, "b", t(2));
        store.seed_answered(2, "q", t(1), t(2));
        store.seed(2, SenderRole::User, "later", t(3));
        store.seed(3, SenderRole::Bot, "auto", t(1));
        engine.record_response(ConversationId(3), t(5)).await;

        let ids = [ConversationId(1), ConversationId(2), ConversationId(3), ConversationId(4)];
        let batch = engine.get_all_unread_counts(&ids).await.unwrap();
        for id in ids {
            assert_eq!(batch[&id], engine.get_unread_count(id).await.unwrap(), "{id}");
        }
        assert_eq!(batch[&ConversationId(1)], 2);
        assert_eq!(batch[&ConversationId(2)], 1);
        assert_eq!(batch[&ConversationId(4)], 0);
    }

    #[tokio::test]
    async fn batch_uses_one_query() {
        let (engine, store, _) = engine();
        let ids: Vec<_> = (1..=10).map(ConversationId).collect();
        engine.get_all_unread_counts(&ids).await.unwrap();
        assert_eq!(store.query_count(), 1);
        assert!(engine.get_all_unread_counts(&[]).await.unwrap().is_empty());
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn one_notification_per_mutation() {
        let (engine, store, _) = engine();
        let hits = counter(&engine);
        let c1 = ConversationId(1);

        let m = store.seed(1, SenderRole::User, "a", t(1));
        engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        engine.record_response(c1, t(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        engine.mark_as_read(c1).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        // Read path with no change stays quiet.
        engine.refresh(c1).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn batch_keeps_state_written_during_its_query() {
        let (engine, store, _) = engine();
        let c1 = ConversationId(1);
        store.seed(1, SenderRole::User, "first", t(1));
        assert_eq!(engine.get_unread_count(c1).await.unwrap(), 1);

        let (_id, mut updates) = engine.subscribe_channel();
        let gate = store.gate_next_batch();
        let batch = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.get_all_states(&[c1, ConversationId(2)]).await })
        };
        gate.entered.notified().await;

        let m = store.seed(1, SenderRole::User, "second", t(2));
        engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        assert_eq!(engine.cached_count(c1), 2);

        gate.release.notify_one();
        let states = batch.await.unwrap().unwrap();
        assert_eq!(states[&c1].count, 2);
        assert_eq!(states[&ConversationId(2)].count, 0);
        assert_eq!(engine.cached_count(c1), 2);

        let mut last_for_c1 = None;
        while let Ok(update) = updates.try_recv() {
            if update.conversation_id == c1 {
                last_for_c1 = Some(update.count);
            }
        }
        assert_eq!(last_for_c1, Some(2));
    }

    #[tokio::test]
    async fn turn_entries_do_not_outlive_their_work() {
        let (engine, store, _) = engine();
        for id in 1..=20 {
            let m = store.seed(id, SenderRole::User, "hi", t(id));
            engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
            engine.mark_as_read(ConversationId(id)).await;
        }
        let ids: Vec<_> = (1..=20).map(ConversationId).collect();
        engine.get_all_states(&ids).await.unwrap();
        assert!(engine.inner.turns.is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_observer_stops_receiving() {
        let (engine, store, _) = engine();
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let id = engine.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(engine.subscriber_count(), 1);

        let m = store.seed(1, SenderRole::User, "a", t(1));
        engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(engine.unsubscribe(id));
        assert!(!engine.unsubscribe(id));
        assert_eq!(engine.subscriber_count(), 0);

        let m = store.seed(1, SenderRole::User, "b", t(2));
        engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn operator_and_bot_inserts_are_ignored() {
        let (engine, store, _) = engine();
        let hits = counter(&engine);
        for sender in [SenderRole::Operator, SenderRole::Bot] {
            let m = store.seed(1, sender, "x", t(1));
            engine.handle_change(&ChangeEvent::inserted(m)).await.unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(engine.tracked_conversations().is_empty());
    }

    #[tokio::test]
    async fn snapshot_written_after_mutation() {
        let (engine, store, snapshots) = engine();
        store.seed(7, SenderRole::User, "a", t(1));
        engine.refresh(ConversationId(7)).await.unwrap();

        let snapshot = snapshots.get(ConversationId(7)).unwrap();
        assert_eq!(snapshot.state.count, 1);
        assert_eq!(snapshot.state.last_message_at, Some(t(1)));
    }

    #[tokio::test]
    async fn warm_skips_stale_snapshots() {
        let (engine, _, snapshots) = engine();
        let state = UnreadState {
            count: 3,
            last_message_at: Some(t(1)),
            last_response_at: None,
        };
        snapshots.put(UnreadSnapshot {
            conversation_id: ConversationId(1),
            state,
            cached_at: Utc::now(),
        });
        snapshots.put(UnreadSnapshot {
            conversation_id: ConversationId(2),
            state,
            cached_at: Utc::now() - chrono::Duration::minutes(10),
        });

        assert_eq!(engine.warm_from_snapshots().await.unwrap(), 1);
        assert_eq!(engine.cached_count(ConversationId(1)), 3);
        assert_eq!(engine.cached_count(ConversationId(2)), 0);
    }

    #[tokio::test]
    async fn clear_cache_drops_everything() {
        let (engine, store, snapshots) = engine();
        store.seed(1, SenderRole::User, "a", t(1));
        engine.refresh(ConversationId(1)).await.unwrap();

        engine.clear_cache().await.unwrap();
        assert!(engine.tracked_conversations().is_empty());
        assert_eq!(snapshots.len(), 0);
        assert_eq!(engine.cached_count(ConversationId(1)), 0);
    }

    #[tokio::test]
    async fn change_feed_drives_counts() {
        let (engine, store, _) = engine();
        let (_id, mut updates) = engine.subscribe_channel();
        let shutdown = CancellationToken::new();
        let task = engine.spawn_change_feed(shutdown.clone());

        store
            .insert(&NewMessage {
                conversation_id: ConversationId(9),
                body: "hello".into(),
                sender: SenderRole::User,
            })
            .await
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.conversation_id, ConversationId(9));
        assert_eq!(update.count, 1);

        shutdown.cancel();
        task.await.unwrap();
    }
}
