//! Conversation HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/users/{tenant}                    - Sorted conversation directory
//! - GET  /api/v1/conversations/{id}/messages       - Message history
//! - POST /api/v1/conversations/{id}/messages       - Operator reply
//! - PUT  /api/v1/conversations/{id}/escalation     - Set the human-required flag
//! - PUT  /api/v1/conversations/{id}/automation     - Toggle automated replies

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use relaydesk_core::directory::ConversationDirectory;
use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_core::repository::message::{MessageFilter, MessageStore};
use relaydesk_core::repository::SortOrder;
use relaydesk_types::conversation::{Conversation, ConversationId, DirectoryListing};
use relaydesk_types::message::{Message, SenderRole};

use super::visible_conversation;
use crate::http::error::AppError;
use crate::http::extractors::auth::Operator;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/users/{tenant} - Conversations visible to the operator, in display order.
pub async fn list_directory(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(tenant): Path<String>,
) -> Result<Json<ApiResponse<DirectoryListing>>, AppError> {
    let start = Instant::now();
    let listing = state.directory.list(&user, &tenant).await?;
    Ok(Json(
        ApiResponse::success(listing, start).with_link("self", &format!("/api/v1/users/{tenant}")),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    100
}

/// GET /api/v1/conversations/{id}/messages - The latest messages, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let start = Instant::now();
    if query.limit <= 0 {
        return Err(AppError::Validation("limit must be positive".to_string()));
    }
    visible_conversation(&state, &user, id).await?;

    let filter = MessageFilter {
        limit: Some(query.limit),
        ..MessageFilter::conversation(id)
    };
    let mut messages = state.messages.query(&filter, SortOrder::Desc).await?;
    messages.reverse();

    Ok(Json(ApiResponse::success(messages, start)))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

/// POST /api/v1/conversations/{id}/messages - Relay an operator reply.
pub async fn send_reply(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
    Json(body): Json<ReplyRequest>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let start = Instant::now();
    visible_conversation(&state, &user, id).await?;

    let message = state
        .relay
        .relay_message(id, &body.text, SenderRole::Operator)
        .await?;
    tracing::info!(operator = %user.id, conversation_id = %id, message_id = %message.id, "operator reply sent");

    Ok(Json(ApiResponse::success(message, start)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRequest {
    pub human_required: bool,
}

/// PUT /api/v1/conversations/{id}/escalation
pub async fn set_escalation(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
    Json(body): Json<EscalationRequest>,
) -> Result<Json<ApiResponse<Conversation>>, AppError> {
    let start = Instant::now();
    visible_conversation(&state, &user, id).await?;
    let conversation = state.conversations.set_escalation(id, body.human_required).await?;
    tracing::info!(operator = %user.id, conversation_id = %id, human_required = body.human_required, "escalation updated");
    Ok(Json(ApiResponse::success(conversation, start)))
}

#[derive(Debug, Deserialize)]
pub struct AutomationRequest {
    pub enabled: bool,
}

/// PUT /api/v1/conversations/{id}/automation
pub async fn set_automation(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
    Json(body): Json<AutomationRequest>,
) -> Result<Json<ApiResponse<Conversation>>, AppError> {
    let start = Instant::now();
    visible_conversation(&state, &user, id).await?;
    let conversation = state.conversations.set_automation(id, body.enabled).await?;
    tracing::info!(operator = %user.id, conversation_id = %id, enabled = body.enabled, "automation updated");
    Ok(Json(ApiResponse::success(conversation, start)))
}
