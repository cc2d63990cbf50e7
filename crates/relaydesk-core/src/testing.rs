//! In-memory doubles for the repository and capability traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use relaydesk_types::auth::TenantScope;
use relaydesk_types::conversation::{
    Conversation, ConversationId, EndUser, InboundMessage, Platform, TenantId,
};
use relaydesk_types::error::{PlatformError, ReplyError, RepositoryError};
use relaydesk_types::message::{ChangeEvent, Message, MessageId, NewMessage, SenderRole};
use relaydesk_types::unread::UnreadSnapshot;
use tokio::sync::{Notify, broadcast};

use crate::event::ChangeFeed;
use crate::relay::delivery::OutboundDelivery;
use crate::relay::reply::ReplyGenerator;
use crate::repository::SortOrder;
use crate::repository::conversation::ConversationRepository;
use crate::repository::message::{MessageFilter, MessageStore};
use crate::repository::platform_bot::{PlatformBot, PlatformBotRepository};
use crate::repository::unread_snapshot::UnreadSnapshotStore;

/// Fixed instant used as "t0" by tests that need deterministic timestamps.
pub fn t(offset_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
}

pub fn conversation(id: i64, tenant: &str, platform: Platform) -> Conversation {
    Conversation {
        id: ConversationId(id),
        tenant_id: TenantId::new(tenant),
        end_user: EndUser {
            external_id: format!("ext-{id}"),
            name: None,
            username: None,
            nickname: None,
            platform,
            chat_id: format!("chat-{id}"),
        },
        human_required: false,
        automation_enabled: true,
        created_at: t(0),
        updated_at: t(0),
    }
}

pub fn named(id: i64, name: &str) -> Conversation {
    let mut conv = conversation(id, "acme", Platform::Telegram);
    conv.end_user.name = Some(name.to_string());
    conv
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Pauses a store query between reading its rows and returning them.
#[derive(Default)]
pub struct QueryGate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
    next_id: AtomicI64,
    feed: ChangeFeed,
    fail_inserts: AtomicBool,
    fail_links: AtomicBool,
    queries: AtomicUsize,
    batch_gate: Mutex<Option<Arc<QueryGate>>>,
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            feed: ChangeFeed::new(256),
            fail_inserts: AtomicBool::new(false),
            fail_links: AtomicBool::new(false),
            queries: AtomicUsize::new(0),
            batch_gate: Mutex::new(None),
        }
    }
}

impl InMemoryMessageStore {
    /// Seed a message at an explicit time without emitting a change event.
    pub fn seed(&self, conversation_id: i64, sender: SenderRole, body: &str, at: DateTime<Utc>) -> Message {
        let message = Message {
            id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
            conversation_id: ConversationId(conversation_id),
            body: body.to_string(),
            sender,
            created_at: at,
            response: None,
            responded_at: None,
        };
        self.messages.lock().unwrap().push(message.clone());
        message
    }

    /// Seed a user message that already has a linked response.
    pub fn seed_answered(&self, conversation_id: i64, body: &str, at: DateTime<Utc>, responded_at: DateTime<Utc>) {
        let mut message = self.seed(conversation_id, SenderRole::User, body, at);
        message.response = Some("handled".to_string());
        message.responded_at = Some(responded_at);
        let mut messages = self.messages.lock().unwrap();
        if let Some(slot) = messages.iter_mut().find(|m| m.id == message.id) {
            *slot = message;
        }
    }

    /// Rewrite a message body and emit the matching `UPDATE`.
    pub fn edit_body(&self, id: MessageId, body: &str) {
        let mut messages = self.messages.lock().unwrap();
        if let Some(slot) = messages.iter_mut().find(|m| m.id == id) {
            let old = slot.clone();
            slot.body = body.to_string();
            self.feed.publish(ChangeEvent::updated(old, slot.clone()));
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_links(&self, fail: bool) {
        self.fail_links.store(fail, Ordering::SeqCst);
    }

    /// Hold the next multi-conversation query after it has read its rows.
    pub fn gate_next_batch(&self) -> Arc<QueryGate> {
        let gate = Arc::new(QueryGate::default());
        *self.batch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("insert rejected".to_string()));
        }
        let stored = {
            let mut messages = self.messages.lock().unwrap();
            let mut created_at = Utc::now();
            if let Some(last) = messages.iter().map(|m| m.created_at).max() {
                if created_at <= last {
                    created_at = last + Duration::microseconds(1);
                }
            }
            let stored = Message {
                id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
                conversation_id: message.conversation_id,
                body: message.body.clone(),
                sender: message.sender,
                created_at,
                response: None,
                responded_at: None,
            };
            messages.push(stored.clone());
            stored
        };
        self.feed.publish(ChangeEvent::inserted(stored.clone()));
        Ok(stored)
    }

    async fn query(&self, filter: &MessageFilter, order: SortOrder) -> Result<Vec<Message>, RepositoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| filter.conversation_ids.is_empty() || filter.conversation_ids.contains(&m.conversation_id))
            .filter(|m| filter.sender.is_none_or(|s| s == m.sender))
            .filter(|m| filter.after.is_none_or(|after| m.created_at > after))
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.created_at, m.id));
        if order == SortOrder::Desc {
            rows.reverse();
        }
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        if filter.conversation_ids.len() > 1 {
            let gate = self.batch_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        Ok(rows)
    }

    async fn link_response(
        &self,
        conversation_id: ConversationId,
        response: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Message>, RepositoryError> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("link rejected".to_string()));
        }
        let change = {
            let mut messages = self.messages.lock().unwrap();
            let target = messages
                .iter_mut()
                .filter(|m| m.conversation_id == conversation_id && m.sender == SenderRole::User)
                .filter(|m| !m.has_response())
                .max_by_key(|m| (m.created_at, m.id));
            match target {
                Some(slot) => {
                    let old = slot.clone();
                    slot.response = Some(response.to_string());
                    slot.responded_at = Some(at);
                    Some(ChangeEvent::updated(old, slot.clone()))
                }
                None => None,
            }
        };
        Ok(change.map(|change| {
            let linked = change.new.clone();
            self.feed.publish(change);
            linked
        }))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryConversations {
    rows: Mutex<HashMap<ConversationId, Conversation>>,
    lists: AtomicUsize,
}

impl InMemoryConversations {
    pub fn insert(&self, conversation: Conversation) {
        self.rows.lock().unwrap().insert(conversation.id, conversation);
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    fn update(
        &self,
        id: ConversationId,
        apply: impl FnOnce(&mut Conversation),
    ) -> Result<Conversation, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let conv = rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        apply(conv);
        conv.updated_at = Utc::now();
        Ok(conv.clone())
    }
}

impl ConversationRepository for InMemoryConversations {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, scope: &TenantScope) -> Result<Vec<Conversation>, RepositoryError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<Conversation> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| scope.contains(&c.tenant_id))
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.created_at, c.id));
        Ok(rows)
    }

    async fn upsert_from_inbound(&self, inbound: &InboundMessage) -> Result<Conversation, RepositoryError> {
        let platform = Platform::normalize(&inbound.platform);
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.values_mut().find(|c| {
            c.tenant_id == inbound.tenant_id
                && c.end_user.platform == platform
                && c.end_user.external_id == inbound.external_id
        }) {
            if inbound.name.is_some() {
                existing.end_user.name = inbound.name.clone();
            }
            return Ok(existing.clone());
        }
        let id = ConversationId(rows.keys().map(|k| k.0).max().unwrap_or(0) + 1);
        let mut conv = conversation(id.0, inbound.tenant_id.as_str(), platform);
        conv.end_user.external_id = inbound.external_id.clone();
        conv.end_user.chat_id = inbound.chat_id.clone();
        conv.end_user.name = inbound.name.clone();
        conv.end_user.username = inbound.username.clone();
        rows.insert(id, conv.clone());
        Ok(conv)
    }

    async fn set_escalation(&self, id: ConversationId, human_required: bool) -> Result<Conversation, RepositoryError> {
        self.update(id, |c| c.human_required = human_required)
    }

    async fn set_automation(&self, id: ConversationId, enabled: bool) -> Result<Conversation, RepositoryError> {
        self.update(id, |c| c.automation_enabled = enabled)
    }
}

// ---------------------------------------------------------------------------
// Snapshots and bots
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySnapshots {
    rows: Mutex<HashMap<ConversationId, UnreadSnapshot>>,
}

impl InMemorySnapshots {
    pub fn get(&self, id: ConversationId) -> Option<UnreadSnapshot> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, snapshot: UnreadSnapshot) {
        self.rows.lock().unwrap().insert(snapshot.conversation_id, snapshot);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl UnreadSnapshotStore for InMemorySnapshots {
    async fn load_all(&self) -> Result<Vec<UnreadSnapshot>, RepositoryError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn save(&self, snapshot: &UnreadSnapshot) -> Result<(), RepositoryError> {
        self.put(snapshot.clone());
        Ok(())
    }

    async fn remove(&self, conversation_id: ConversationId) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().remove(&conversation_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPlatformBots {
    rows: Mutex<Vec<PlatformBot>>,
}

impl InMemoryPlatformBots {
    pub fn insert(&self, bot: PlatformBot) {
        self.rows.lock().unwrap().push(bot);
    }
}

impl PlatformBotRepository for InMemoryPlatformBots {
    async fn find_active(&self, tenant_id: &TenantId, platform: Platform) -> Result<Option<PlatformBot>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.is_active && &b.tenant_id == tenant_id && b.platform == platform)
            .cloned())
    }

    async fn save(&self, bot: &PlatformBot) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|b| b.id != bot.id);
        rows.push(bot.clone());
        Ok(())
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<PlatformBot>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|b| &b.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Replies with `auto: <trigger text>`, or fails when `fail` is set.
#[derive(Default)]
pub struct EchoReplies {
    pub fail: AtomicBool,
}

impl ReplyGenerator for EchoReplies {
    async fn generate(&self, _conversation: &Conversation, trigger: &Message) -> Result<String, ReplyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReplyError::Request("generator offline".to_string()));
        }
        Ok(format!("auto: {}", trigger.body))
    }
}

/// Records every delivery attempt.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<(ConversationId, String)>>,
}

impl RecordingDelivery {
    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl OutboundDelivery for RecordingDelivery {
    async fn deliver(&self, conversation: &Conversation, text: &str) -> Result<bool, PlatformError> {
        self.sent.lock().unwrap().push((conversation.id, text.to_string()));
        Ok(true)
    }
}
