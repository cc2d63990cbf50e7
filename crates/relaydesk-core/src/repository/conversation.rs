//! Conversation repository trait definition.

use relaydesk_types::auth::TenantScope;
use relaydesk_types::conversation::{Conversation, ConversationId, InboundMessage};
use relaydesk_types::error::RepositoryError;

/// Repository trait for conversation persistence.
///
/// Conversations are created on first inbound contact and never deleted here.
pub trait ConversationRepository: Send + Sync {
    /// Get a conversation by id.
    fn get(
        &self,
        id: ConversationId,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List conversations visible in the given scope, oldest first.
    fn list(
        &self,
        scope: &TenantScope,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;

    /// Find the conversation for an inbound message's sender, creating it on
    /// first contact. Refreshes the end user's name/username when provided.
    fn upsert_from_inbound(
        &self,
        inbound: &InboundMessage,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Set the escalation flag. Returns `NotFound` for unknown ids.
    fn set_escalation(
        &self,
        id: ConversationId,
        human_required: bool,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Toggle automated replies. Returns `NotFound` for unknown ids.
    fn set_automation(
        &self,
        id: ConversationId,
        enabled: bool,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;
}
