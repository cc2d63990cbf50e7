//! Inbound platform messages.
//!
//! POST /api/v1/inbound
//!
//! Platform webhooks (or an adapter in front of them) post a normalized
//! [`InboundMessage`]. The conversation is created on first contact and the
//! text is relayed as a `user` message.

use std::time::Instant;

use axum::extract::State;
use axum::Json;

use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_types::conversation::InboundMessage;
use relaydesk_types::message::{Message, SenderRole};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn receive_inbound(
    State(state): State<AppState>,
    Json(inbound): Json<InboundMessage>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let start = Instant::now();
    if inbound.external_id.trim().is_empty() || inbound.tenant_id.as_str().trim().is_empty() {
        return Err(AppError::Validation("tenant_id and external_id are required".to_string()));
    }
    if inbound.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }

    let conversation = state.conversations.upsert_from_inbound(&inbound).await?;
    let message = state
        .relay
        .relay_message(conversation.id, &inbound.text, SenderRole::User)
        .await?;

    tracing::debug!(
        conversation_id = %conversation.id,
        tenant_id = %conversation.tenant_id,
        platform = %conversation.end_user.platform,
        "inbound message relayed"
    );
    Ok(Json(ApiResponse::success(message, start)))
}
