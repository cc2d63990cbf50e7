//! Per-conversation unread state and its persisted snapshot form.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;

/// Unread bookkeeping for one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadState {
    #[serde(rename = "unreadCount")]
    pub count: u32,
    #[serde(rename = "lastMessageTime")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastResponseTime", default, skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
}

/// Durable copy of an [`UnreadState`], stamped with when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSnapshot {
    pub conversation_id: ConversationId,
    #[serde(flatten)]
    pub state: UnreadState,
    pub cached_at: DateTime<Utc>,
}

impl UnreadSnapshot {
    /// A snapshot is readable only inside the freshness horizon.
    pub fn is_fresh(&self, now: DateTime<Utc>, horizon: Duration) -> bool {
        now.signed_duration_since(self.cached_at) < horizon
    }
}

/// Notification delivered to unread subscribers after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadUpdate {
    pub conversation_id: ConversationId,
    pub count: u32,
    pub last_message_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_freshness() {
        let now = Utc::now();
        let snap = UnreadSnapshot {
            conversation_id: ConversationId(1),
            state: UnreadState::default(),
            cached_at: now - Duration::minutes(4),
        };
        assert!(snap.is_fresh(now, Duration::minutes(5)));
        assert!(!snap.is_fresh(now + Duration::minutes(2), Duration::minutes(5)));
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snap = UnreadSnapshot {
            conversation_id: ConversationId(3),
            state: UnreadState {
                count: 2,
                last_message_at: None,
                last_response_at: None,
            },
            cached_at: Utc::now(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["unreadCount"], 2);
        assert!(json["lastMessageTime"].is_null());
        assert!(json.get("lastResponseTime").is_none());
        assert!(json.get("cachedAt").is_some());
    }
}
