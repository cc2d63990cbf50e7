//! Wire events exchanged with connected viewers.
//!
//! Every frame is a tagged JSON object: `{"type": "<event>", "data": {...}}`.
//! Payload-less events (the heartbeat) carry no `data` key, so the heartbeat
//! frame is exactly `{"type":"heartbeat"}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::conversation::ConversationId;
use crate::message::{Message, SenderRole};
use crate::unread::UnreadUpdate;

/// Events pushed from the relay to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// A message was persisted in the conversation.
    NewMessage(Message),

    /// Another viewer joined the conversation room.
    UserJoined {
        user_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A viewer left the conversation room.
    UserLeft { user_id: String },

    /// Ephemeral typing indicator from another viewer.
    UserTyping { user_id: String, is_typing: bool },

    /// Relaying the sender's message failed.
    MessageError { error: String },

    /// Unread state of a conversation changed (inbox streams only).
    UnreadChanged(UnreadUpdate),

    /// Keep-alive frame on one-way streams. Never an application message.
    Heartbeat,
}

impl ServerEvent {
    /// Wire name of the event (the `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::UserTyping { .. } => "user-typing",
            ServerEvent::MessageError { .. } => "message-error",
            ServerEvent::UnreadChanged(_) => "unread-changed",
            ServerEvent::Heartbeat => "heartbeat",
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        matches!(self, ServerEvent::Heartbeat)
    }
}

/// Events sent by duplex viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinChat {
        user_id: String,
        chat_id: ConversationId,
    },
    SendMessage {
        chat_id: ConversationId,
        message: String,
        sender: SenderRole,
    },
    TypingStart {
        chat_id: ConversationId,
        user_id: String,
    },
    TypingStop {
        chat_id: ConversationId,
        user_id: String,
    },
}

/// Discriminant of [`ClientEvent`], used to register per-event handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    JoinChat,
    SendMessage,
    TypingStart,
    TypingStop,
}

impl ClientEvent {
    pub fn kind(&self) -> ClientEventKind {
        match self {
            ClientEvent::JoinChat { .. } => ClientEventKind::JoinChat,
            ClientEvent::SendMessage { .. } => ClientEventKind::SendMessage,
            ClientEvent::TypingStart { .. } => ClientEventKind::TypingStart,
            ClientEvent::TypingStop { .. } => ClientEventKind::TypingStop,
        }
    }
}

impl fmt::Display for ClientEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEventKind::JoinChat => write!(f, "join-chat"),
            ClientEventKind::SendMessage => write!(f, "send-message"),
            ClientEventKind::TypingStart => write!(f, "typing-start"),
            ClientEventKind::TypingStop => write!(f, "typing-stop"),
        }
    }
}

/// Parse a one-way stream frame, dropping heartbeats.
///
/// Returns `Ok(None)` for heartbeat frames so callers never hand them to
/// application handlers.
pub fn parse_stream_frame(raw: &str) -> Result<Option<ServerEvent>, serde_json::Error> {
    let event: ServerEvent = serde_json::from_str(raw)?;
    Ok((!event.is_heartbeat()).then_some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;

    #[test]
    fn test_heartbeat_frame_shape() {
        let json = serde_json::to_string(&ServerEvent::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn test_typing_event_uses_camel_case_fields() {
        let event = ServerEvent::UserTyping {
            user_id: "op-2".to_string(),
            is_typing: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user-typing");
        assert_eq!(json["data"]["userId"], "op-2");
        assert_eq!(json["data"]["isTyping"], true);
    }

    #[test]
    fn test_new_message_carries_message_payload() {
        let event = ServerEvent::NewMessage(Message {
            id: MessageId(9),
            conversation_id: ConversationId(4),
            body: "hello".to_string(),
            sender: SenderRole::Bot,
            created_at: Utc::now(),
            response: None,
            responded_at: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
        assert_eq!(json["data"]["text"], "hello");
        assert_eq!(json["data"]["conversation_id"], 4);
    }

    #[test]
    fn test_client_event_parses_send_message() {
        let raw = r#"{"type":"send-message","data":{"chatId":12,"message":"hi","sender":"operator"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind(), ClientEventKind::SendMessage);
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                chat_id: ConversationId(12),
                message: "hi".to_string(),
                sender: SenderRole::Operator,
            }
        );
    }

    #[test]
    fn test_parse_stream_frame_filters_heartbeat() {
        assert_eq!(parse_stream_frame(r#"{"type":"heartbeat"}"#).unwrap(), None);

        let frame = r#"{"type":"user-left","data":{"userId":"op-1"}}"#;
        assert_eq!(
            parse_stream_frame(frame).unwrap(),
            Some(ServerEvent::UserLeft {
                user_id: "op-1".to_string()
            })
        );
        assert!(parse_stream_frame("not json").is_err());
    }
}
