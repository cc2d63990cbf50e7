//! One-way (SSE) transports.
//!
//! Endpoints:
//! - GET /api/v1/conversations/{id}/stream?viewer=... - Room events of one conversation
//! - GET /api/v1/inbox/stream                         - `unread-changed` frames
//!
//! Every SSE `data` field carries one JSON frame (`{"type": ..., "data": ...}`).
//! A `{"type":"heartbeat"}` frame goes out every heartbeat interval. The
//! session closes when the client disconnects or the server shuts down.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use relaydesk_core::realtime::session::Outbound;
use relaydesk_core::realtime::{SessionHandle, TransportKind};
use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_types::auth::TenantScope;
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::event::ServerEvent;

use super::visible_conversation;
use crate::http::error::AppError;
use crate::http::extractors::auth::Operator;
use crate::state::AppState;

/// Closes the session when the response stream is dropped.
struct CloseOnDrop(SessionHandle);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Turn a session's outbound queue into an SSE body.
fn session_stream(
    session: SessionHandle,
    mut outbound: Outbound,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let lifetime = session.lifetime();
        let _guard = CloseOnDrop(session);
        loop {
            let frame = tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = shutdown.cancelled() => break,
                frame = outbound.recv() => frame,
            };
            let Some(event) = frame else { break };
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok(sse),
                Err(e) => tracing::warn!(event = event.name(), error = %e, "failed to encode stream frame"),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Viewer id announced to the room. Defaults to the operator id.
    pub viewer: Option<String>,
}

/// GET /api/v1/conversations/{id}/stream
pub async fn conversation_stream(
    State(state): State<AppState>,
    Operator(user): Operator,
    Path(id): Path<ConversationId>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    visible_conversation(&state, &user, id).await?;

    let (session, outbound) = SessionHandle::new(TransportKind::Stream);
    let viewer = query
        .viewer
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| user.id.clone());

    state.broker.attach(&session);
    state.broker.join_room(&session, id, &viewer);
    session.start_heartbeat(state.config.heartbeat_interval());
    tracing::debug!(session_id = %session.id(), conversation_id = %id, viewer = %viewer, "stream opened");

    Ok(Sse::new(session_stream(session, outbound, state.shutdown.clone())))
}

/// GET /api/v1/inbox/stream
pub async fn inbox_stream(
    State(state): State<AppState>,
    Operator(user): Operator,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let scope = user.default_scope()?;
    let (session, outbound) = SessionHandle::new(TransportKind::Stream);

    let (subscription, mut updates) = state.unread.subscribe_channel();
    let unread = state.unread.clone();
    session.on_close(move |_| {
        unread.unsubscribe(subscription);
    });

    let forwarder = session.clone();
    let conversations = state.conversations.clone();
    let lifetime = session.lifetime();
    tokio::spawn(async move {
        // Tenant of each conversation seen so far; conversations never move tenants.
        let mut visible: HashMap<ConversationId, bool> = HashMap::new();
        loop {
            let update = tokio::select! {
                _ = lifetime.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };

            let allowed = match (&scope, visible.get(&update.conversation_id)) {
                (TenantScope::All, _) => true,
                (_, Some(allowed)) => *allowed,
                (TenantScope::Tenant(_), None) => {
                    let allowed = match conversations.get(update.conversation_id).await {
                        Ok(Some(conversation)) => scope.contains(&conversation.tenant_id),
                        Ok(None) => false,
                        Err(e) => {
                            tracing::warn!(conversation_id = %update.conversation_id, error = %e, "inbox visibility lookup failed");
                            continue;
                        }
                    };
                    visible.insert(update.conversation_id, allowed);
                    allowed
                }
            };

            if allowed && !forwarder.send(ServerEvent::UnreadChanged(update)) {
                break;
            }
        }
    });

    session.start_heartbeat(state.config.heartbeat_interval());
    tracing::debug!(session_id = %session.id(), operator = %user.id, "inbox stream opened");

    Ok(Sse::new(session_stream(session, outbound, state.shutdown.clone())))
}
