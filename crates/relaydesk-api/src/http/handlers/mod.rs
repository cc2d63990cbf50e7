//! HTTP and socket handlers.

pub mod conversation;
pub mod inbound;
pub mod stream;
pub mod unread;
pub mod ws;

use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::{Conversation, ConversationId};
use relaydesk_types::error::AuthorizationError;

use crate::http::error::AppError;
use crate::state::AppState;

/// Load a conversation the operator is allowed to see.
///
/// The scope check runs before the lookup so an unbound identity never
/// reaches the store.
pub(crate) async fn visible_conversation(
    state: &AppState,
    user: &AuthUser,
    conversation_id: ConversationId,
) -> Result<Conversation, AppError> {
    let scope = user.default_scope()?;
    let conversation = state
        .conversations
        .get(conversation_id)
        .await?
        .ok_or(AppError::ConversationNotFound(conversation_id))?;

    if !scope.contains(&conversation.tenant_id) {
        return Err(AuthorizationError::Forbidden(conversation.tenant_id.to_string()).into());
    }
    Ok(conversation)
}
