//! Unread count handlers.
//!
//! Endpoints:
//! - GET  /api/v1/unread?ids=1,2,3              - Batch unread state
//! - POST /api/v1/conversations/{id}/read       - Mark a conversation as read

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::unread::UnreadState;

use super::visible_conversation;
use crate::http::error::AppError;
use crate::http::extractors::auth::Operator;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UnreadQuery {
    /// Comma-separated conversation ids.
    #[serde(default)]
    pub ids: String,
}

fn parse_ids(raw: &str) -> Result<Vec<ConversationId>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ConversationId>()
                .map_err(|_| AppError::Validation(format!("Invalid conversation id: {s}")))
        })
        .collect()
}

/// GET /api/v1/unread?ids=1,2,3
///
/// Ids the operator cannot see are left out of the result.
pub async fn batch_unread(
    State(state): State<AppState>,
    Operator(user): Operator,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<ApiResponse<BTreeMap<ConversationId, UnreadState>>>, AppError> {
    let start = Instant::now();
    let scope = user.default_scope()?;
    let requested = parse_ids(&query.ids)?;
    if requested.is_empty() {
        return Ok(Json(ApiResponse::success(BTreeMap::new(), start)));
    }

    let visible: HashSet<ConversationId> = state
        .conversations
        .list(&scope)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let ids: Vec<ConversationId> = requested.into_iter().filter(|id| visible.contains(id)).collect();

    let states = state.unread.get_all_states(&ids).await?;
    Ok(Json(ApiResponse::success(states.into_iter().collect(), start)))
}

/// POST /api/v1/conversations/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
) -> Result<Json<ApiResponse<UnreadState>>, AppError> {
    let start = Instant::now();
    visible_conversation(&state, &user, id).await?;
    let unread = state.unread.mark_as_read(id).await;
    tracing::debug!(operator = %user.id, conversation_id = %id, "conversation marked read");
    Ok(Json(ApiResponse::success(unread, start)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ids_skips_blanks_and_rejects_garbage() {
        let ids = parse_ids(" 3, ,1,").unwrap();
        assert_eq!(ids, vec![ConversationId(3), ConversationId(1)]);
        assert!(parse_ids("").unwrap().is_empty());
        assert!(matches!(parse_ids("1,x"), Err(AppError::Validation(_))));
    }
}
