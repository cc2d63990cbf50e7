//! MessageRelay: the write path of a conversation.
//!
//! A relayed message is persisted, linked (operator replies answer the
//! latest unanswered user message), fanned out to the conversation's room,
//! and handed to platform delivery. Inbound user messages may additionally
//! trigger a delayed automated reply.
//!
//! Persist-then-publish runs under a per-conversation lock, so every viewer
//! receives a conversation's messages in the order they were stored.

use std::sync::Arc;
use std::time::Duration;

use relaydesk_types::config::MIN_BOT_REPLY_DELAY_MS;
use relaydesk_types::conversation::{Conversation, ConversationId};
use relaydesk_types::error::{RelayError, ReplyError, RepositoryError};
use relaydesk_types::event::ServerEvent;
use relaydesk_types::message::{Message, NewMessage, SenderRole};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::delivery::OutboundDelivery;
use super::keyed::KeyedLock;
use super::reply::ReplyGenerator;
use crate::realtime::FanoutBroker;
use crate::repository::conversation::ConversationRepository;
use crate::repository::message::MessageStore;

/// Tunables for [`MessageRelay`].
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Pause before an automated reply is persisted and published.
    pub reply_delay: Duration,
    /// Cancelled on shutdown; pending automated replies are abandoned.
    pub shutdown: CancellationToken,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(MIN_BOT_REPLY_DELAY_MS),
            shutdown: CancellationToken::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AutoReplyError {
    #[error(transparent)]
    Generate(#[from] ReplyError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Relays messages into conversations.
///
/// Generic over its ports so tests can run against in-memory doubles.
pub struct MessageRelay<S, C, G, D> {
    store: Arc<S>,
    conversations: Arc<C>,
    replies: Arc<G>,
    delivery: Arc<D>,
    broker: FanoutBroker,
    turns: Arc<KeyedLock<ConversationId>>,
    options: RelayOptions,
}

impl<S, C, G, D> Clone for MessageRelay<S, C, G, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            conversations: self.conversations.clone(),
            replies: self.replies.clone(),
            delivery: self.delivery.clone(),
            broker: self.broker.clone(),
            turns: self.turns.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S, C, G, D> MessageRelay<S, C, G, D>
where
    S: MessageStore + 'static,
    C: ConversationRepository + 'static,
    G: ReplyGenerator + 'static,
    D: OutboundDelivery + 'static,
{
    pub fn new(
        store: Arc<S>,
        conversations: Arc<C>,
        replies: Arc<G>,
        delivery: Arc<D>,
        broker: FanoutBroker,
        options: RelayOptions,
    ) -> Self {
        Self {
            store,
            conversations,
            replies,
            delivery,
            broker,
            turns: Arc::new(KeyedLock::new()),
            options,
        }
    }

    pub fn broker(&self) -> &FanoutBroker {
        &self.broker
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn conversations(&self) -> &Arc<C> {
        &self.conversations
    }

    /// Persist a message and fan it out to the conversation's room.
    ///
    /// Fails before anything is published if the text is blank, the
    /// conversation does not exist, or the insert fails. An operator reply
    /// that cannot be linked to the user message it answers also fails
    /// unpublished and undelivered. Platform delivery
    /// and automated replies run in the background; their failures are
    /// logged and never undo the relayed message.
    pub async fn relay_message(
        &self,
        conversation_id: ConversationId,
        text: &str,
        sender: SenderRole,
    ) -> Result<Message, RelayError> {
        if text.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .ok_or(RelayError::ConversationNotFound(conversation_id))?;

        let message = {
            let _turn = self.turns.lock(conversation_id).await;
            let message = self
                .store
                .insert(&NewMessage {
                    conversation_id,
                    body: text.to_string(),
                    sender,
                })
                .await?;

            if sender == SenderRole::Operator {
                match self
                    .store
                    .link_response(conversation_id, text, message.created_at)
                    .await
                {
                    Ok(Some(linked)) => {
                        debug!(%conversation_id, message_id = %linked.id, "operator reply linked")
                    }
                    Ok(None) => debug!(%conversation_id, "no unanswered user message to link"),
                    Err(e) => {
                        warn!(%conversation_id, message_id = %message.id, error = %e, "failed to link operator reply");
                        return Err(e.into());
                    }
                }
            }

            let recipients = self
                .broker
                .publish(conversation_id, ServerEvent::NewMessage(message.clone()));
            info!(
                %conversation_id,
                message_id = %message.id,
                %sender,
                recipients,
                "message relayed"
            );
            message
        };

        match sender {
            SenderRole::Operator | SenderRole::Bot => {
                self.spawn_delivery(conversation, message.body.clone());
            }
            SenderRole::User if conversation.automation_enabled => {
                self.spawn_automated_reply(conversation, message.clone());
            }
            SenderRole::User => {
                debug!(%conversation_id, "automation disabled, no automated reply");
            }
        }

        Ok(message)
    }

    fn spawn_delivery(&self, conversation: Conversation, text: String) {
        let relay = self.clone();
        tokio::spawn(async move {
            relay.deliver(&conversation, &text).await;
        });
    }

    async fn deliver(&self, conversation: &Conversation, text: &str) {
        let conversation_id = conversation.id;
        let platform = conversation.end_user.platform;
        match self.delivery.deliver(conversation, text).await {
            Ok(true) => debug!(%conversation_id, %platform, "delivered to platform"),
            Ok(false) => warn!(%conversation_id, %platform, "platform rejected message"),
            Err(e) => warn!(%conversation_id, %platform, error = %e, "platform delivery failed"),
        }
    }

    fn spawn_automated_reply(&self, conversation: Conversation, trigger: Message) {
        let relay = self.clone();
        tokio::spawn(async move {
            let conversation_id = conversation.id;
            if let Err(e) = relay.automated_reply(conversation, trigger).await {
                warn!(%conversation_id, error = %e, "automated reply failed");
                relay.broker.publish(
                    conversation_id,
                    ServerEvent::MessageError {
                        error: "Failed to generate automated reply".to_string(),
                    },
                );
            }
        });
    }

    async fn automated_reply(&self, conversation: Conversation, trigger: Message) -> Result<(), AutoReplyError> {
        let text = self.replies.generate(&conversation, &trigger).await?;
        if text.trim().is_empty() {
            return Err(ReplyError::Empty.into());
        }

        tokio::select! {
            _ = tokio::time::sleep(self.options.reply_delay) => {}
            _ = self.options.shutdown.cancelled() => {
                debug!(conversation_id = %conversation.id, "shutdown, automated reply dropped");
                return Ok(());
            }
        }

        let reply = {
            let _turn = self.turns.lock(conversation.id).await;
            let reply = self
                .store
                .insert(&NewMessage {
                    conversation_id: conversation.id,
                    body: text,
                    sender: SenderRole::Bot,
                })
                .await?;
            self.broker
                .publish(conversation.id, ServerEvent::NewMessage(reply.clone()));
            reply
        };
        info!(conversation_id = %conversation.id, message_id = %reply.id, "automated reply sent");

        self.deliver(&conversation, &reply.body).await;
        Ok(())
    }
}
