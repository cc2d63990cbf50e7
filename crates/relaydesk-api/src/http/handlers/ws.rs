//! Duplex WebSocket transport for console viewers.
//!
//! The `/ws` endpoint upgrades to a WebSocket once the operator identity
//! headers check out. Each connection becomes a duplex [`SessionHandle`]
//! bound to that operator's tenant scope:
//!
//! - **Outbound:** frames queued on the session (room events, typing,
//!   presence, `message-error`) are written as JSON text frames.
//! - **Inbound:** text frames are parsed as [`ClientEvent`]s and routed to
//!   the handlers registered on the session (`join-chat`, `send-message`,
//!   `typing-start`, `typing-stop`). Malformed frames are logged and ignored.
//!
//! Closing the socket closes the session, which drops it from its room and
//! announces `user-left` to the remaining members.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use relaydesk_core::realtime::SessionHandle;
use relaydesk_core::realtime::TransportKind;
use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::TransportError;
use relaydesk_types::event::{ClientEvent, ClientEventKind, ServerEvent};
use relaydesk_types::message::SenderRole;

use super::visible_conversation;
use crate::http::extractors::auth::Operator;
use crate::state::AppState;

/// Text of the `message-error` frame sent when relaying fails.
const SEND_FAILED: &str = "Failed to send message";

/// Text of the `message-error` frame sent when a room is out of scope.
const JOIN_FAILED: &str = "Failed to join conversation";

/// Upgrade an HTTP request to a duplex viewer session.
///
/// The identity headers are checked before the upgrade; a request without
/// them is answered with 401.
pub async fn ws_handler(
    Operator(user): Operator,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, user))
}

/// Whether `user` may act on `conversation_id`. Denials are logged.
async fn permitted(state: &AppState, user: &AuthUser, session: &SessionHandle, conversation_id: ConversationId) -> bool {
    match visible_conversation(state, user, conversation_id).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(
                session_id = %session.id(),
                operator = %user.id,
                %conversation_id,
                error = ?e,
                "socket event rejected"
            );
            false
        }
    }
}

/// Register the client event handlers of a duplex session opened by `user`.
///
/// Every event is checked against the operator's tenant scope before it
/// touches a room or the store. Messages sent over the socket are always
/// operator messages.
pub(crate) fn register_handlers(session: &SessionHandle, state: &AppState, user: &AuthUser) -> Result<(), TransportError> {
    let (handler_state, handler_user) = (state.clone(), user.clone());
    session.on_event(ClientEventKind::JoinChat, move |session, event| {
        let (state, user) = (handler_state.clone(), handler_user.clone());
        async move {
            if let ClientEvent::JoinChat { user_id, chat_id } = event {
                if permitted(&state, &user, &session, chat_id).await {
                    state.broker.join_room(&session, chat_id, &user_id);
                } else {
                    session.send(ServerEvent::MessageError {
                        error: JOIN_FAILED.to_string(),
                    });
                }
            }
        }
    })?;

    let (handler_state, handler_user) = (state.clone(), user.clone());
    session.on_event(ClientEventKind::SendMessage, move |session, event| {
        let (state, user) = (handler_state.clone(), handler_user.clone());
        async move {
            let ClientEvent::SendMessage {
                chat_id,
                message,
                sender,
            } = event
            else {
                return;
            };
            if sender != SenderRole::Operator {
                tracing::warn!(session_id = %session.id(), conversation_id = %chat_id, %sender, "socket sender must be operator");
                session.send(ServerEvent::MessageError {
                    error: SEND_FAILED.to_string(),
                });
                return;
            }
            if !permitted(&state, &user, &session, chat_id).await {
                session.send(ServerEvent::MessageError {
                    error: SEND_FAILED.to_string(),
                });
                return;
            }
            if let Err(e) = state.relay.relay_message(chat_id, &message, SenderRole::Operator).await {
                tracing::warn!(session_id = %session.id(), conversation_id = %chat_id, error = %e, "relay failed");
                session.send(ServerEvent::MessageError {
                    error: SEND_FAILED.to_string(),
                });
            }
        }
    })?;

    for (kind, is_typing) in [
        (ClientEventKind::TypingStart, true),
        (ClientEventKind::TypingStop, false),
    ] {
        let (handler_state, handler_user) = (state.clone(), user.clone());
        session.on_event(kind, move |session, event| {
            let (state, user) = (handler_state.clone(), handler_user.clone());
            async move {
                match event {
                    ClientEvent::TypingStart { chat_id, user_id }
                    | ClientEvent::TypingStop { chat_id, user_id } => {
                        if permitted(&state, &user, &session, chat_id).await {
                            state.broker.typing(&session, chat_id, &user_id, is_typing);
                        }
                    }
                    _ => {}
                }
            }
        })?;
    }

    Ok(())
}

/// Core WebSocket connection loop.
///
/// Multiplexes the session's outbound queue and inbound socket frames in one
/// task. Inbound events are handled in arrival order, so one viewer's
/// messages are relayed in the order they were sent.
async fn handle_ws_connection(socket: WebSocket, state: AppState, user: AuthUser) {
    let (session, mut outbound) = SessionHandle::new(TransportKind::Duplex);
    state.broker.attach(&session);
    if let Err(e) = register_handlers(&session, &state, &user) {
        tracing::warn!(session_id = %session.id(), error = %e, "failed to register socket handlers");
        session.close();
        return;
    }
    tracing::debug!(session_id = %session.id(), operator = %user.id, "socket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let lifetime = session.lifetime();

    loop {
        tokio::select! {
            _ = lifetime.cancelled() => break,
            _ = state.shutdown.cancelled() => break,

            frame = outbound.recv() => {
                let Some(event) = frame else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(event = event.name(), "Failed to serialize ServerEvent: {err}");
                    }
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            session.dispatch(event).await;
                        }
                        Err(err) => {
                            tracing::warn!(
                                session_id = %session.id(),
                                raw = %text.as_str(),
                                error = %err,
                                "Ignoring malformed socket event"
                            );
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    // Binary, ping and pong frames are handled by axum/tungstenite.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    session.close();
    tracing::debug!(session_id = %session.id(), "socket closed");
}
