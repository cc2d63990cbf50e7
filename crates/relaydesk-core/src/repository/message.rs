//! Message store trait definition.
//!
//! The store persists chat messages and pushes a row-level change feed
//! (`INSERT` / `UPDATE`) to every subscriber.

use chrono::{DateTime, Utc};
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::RepositoryError;
use relaydesk_types::message::{ChangeEvent, Message, NewMessage, SenderRole};
use tokio::sync::broadcast;

use super::SortOrder;

/// Filter criteria for message queries.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Restrict to these conversations. Empty means no conversation filter.
    pub conversation_ids: Vec<ConversationId>,
    pub sender: Option<SenderRole>,
    /// Only messages created strictly after this instant.
    pub after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl MessageFilter {
    pub fn conversation(id: ConversationId) -> Self {
        Self {
            conversation_ids: vec![id],
            ..Default::default()
        }
    }

    pub fn conversations(ids: &[ConversationId]) -> Self {
        Self {
            conversation_ids: ids.to_vec(),
            ..Default::default()
        }
    }
}

/// Message persistence with a change-data-capture feed.
///
/// Implementations live in relaydesk-infra (e.g., SqliteMessageStore).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageStore: Send + Sync {
    /// Insert a message. The store assigns the id and a strictly increasing
    /// timestamp, then emits an `INSERT` change event.
    fn insert(
        &self,
        message: &NewMessage,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Query messages ordered by creation time.
    fn query(
        &self,
        filter: &MessageFilter,
        order: SortOrder,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Link an operator response onto the most recent unanswered user message
    /// of the conversation and emit an `UPDATE` change event.
    ///
    /// Returns `None` when no unanswered user message exists.
    fn link_response(
        &self,
        conversation_id: ConversationId,
        response: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Message>, RepositoryError>> + Send;

    /// Subscribe to the change feed. Receives every change made after the call.
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;
}
