//! Chat messages and the row-level change events the store emits for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::conversation::ConversationId;

/// Identifier of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// The end user on the messaging platform (inbound).
    User,
    /// The automated reply path.
    Bot,
    /// A human operator in the console.
    Operator,
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderRole::User => write!(f, "user"),
            SenderRole::Bot => write!(f, "bot"),
            SenderRole::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for SenderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(SenderRole::User),
            "bot" => Ok(SenderRole::Bot),
            "operator" => Ok(SenderRole::Operator),
            other => Err(format!("invalid sender role: '{other}'")),
        }
    }
}

/// A persisted chat message.
///
/// Immutable once created, except for the response linkage (`response` and
/// `responded_at`), which goes from absent to present exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    #[serde(rename = "text")]
    pub body: String,
    pub sender: SenderRole,
    pub created_at: DateTime<Utc>,
    /// Operator reply linked to this inbound message.
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Message {
    /// True when an operator response is linked (blank text counts as absent).
    pub fn has_response(&self) -> bool {
        self.response
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// True for inbound user messages with content and no linked response.
    pub fn is_unread_eligible(&self) -> bool {
        self.sender == SenderRole::User && !self.body.trim().is_empty() && !self.has_response()
    }
}

/// A message about to be inserted. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub body: String,
    pub sender: SenderRole,
}

/// Row-level change kind on the messages table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// One change-feed event: `{eventType, new, old}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    pub new: Message,
    pub old: Option<Message>,
}

impl ChangeEvent {
    pub fn inserted(message: Message) -> Self {
        Self {
            kind: ChangeKind::Insert,
            new: message,
            old: None,
        }
    }

    pub fn updated(old: Message, new: Message) -> Self {
        Self {
            kind: ChangeKind::Update,
            new,
            old: Some(old),
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.new.conversation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: SenderRole, body: &str, response: Option<&str>) -> Message {
        Message {
            id: MessageId(1),
            conversation_id: ConversationId(1),
            body: body.to_string(),
            sender,
            created_at: Utc::now(),
            response: response.map(str::to_string),
            responded_at: None,
        }
    }

    #[test]
    fn test_unread_eligibility() {
        assert!(message(SenderRole::User, "hi", None).is_unread_eligible());
        assert!(!message(SenderRole::User, "   ", None).is_unread_eligible());
        assert!(!message(SenderRole::User, "hi", Some("hello")).is_unread_eligible());
        assert!(!message(SenderRole::Bot, "hi", None).is_unread_eligible());
        assert!(!message(SenderRole::Operator, "hi", None).is_unread_eligible());
    }

    #[test]
    fn test_blank_response_is_not_a_response() {
        let msg = message(SenderRole::User, "hi", Some("  "));
        assert!(!msg.has_response());
        assert!(msg.is_unread_eligible());
    }

    #[test]
    fn test_message_body_serializes_as_text() {
        let json = serde_json::to_value(message(SenderRole::User, "hi", None)).unwrap();
        assert_eq!(json["text"], "hi");
        assert_eq!(json["sender"], "user");
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_change_event_wire_shape() {
        let event = ChangeEvent::inserted(message(SenderRole::User, "hi", None));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "INSERT");
        assert!(json["old"].is_null());
    }
}
