//! The unread recompute rule.
//!
//! Shared by the single-conversation and batch paths so both always agree.

use chrono::{DateTime, Utc};
use relaydesk_types::message::{Message, SenderRole};
use relaydesk_types::unread::UnreadState;

/// Lower bounds below which inbound messages no longer count as unread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    /// Last operator response already known for the conversation.
    pub last_response: Option<DateTime<Utc>>,
    /// Last explicit read acknowledgment.
    pub read_through: Option<DateTime<Utc>>,
}

/// Derive a conversation's unread state from its messages.
///
/// `messages` must all belong to one conversation; order does not matter.
/// The response time is the later of the known watermark and any response
/// linked on the messages themselves. Only user messages with a non-blank
/// body count as inbound activity.
pub fn compute_unread<'a>(
    messages: impl IntoIterator<Item = &'a Message>,
    marks: Watermarks,
) -> UnreadState {
    let messages: Vec<&Message> = messages.into_iter().collect();

    let last_response_at = messages
        .iter()
        .filter_map(|m| m.has_response().then_some(m.responded_at).flatten())
        .chain(marks.last_response)
        .max();

    let floor = last_response_at.max(marks.read_through);

    let inbound = messages
        .iter()
        .filter(|m| m.sender == SenderRole::User && !m.body.trim().is_empty());

    let last_message_at = inbound.clone().map(|m| m.created_at).max();
    let count = inbound
        .filter(|m| !m.has_response())
        .filter(|m| floor.is_none_or(|floor| m.created_at > floor))
        .count();

    UnreadState {
        count: u32::try_from(count).unwrap_or(u32::MAX),
        last_message_at,
        last_response_at,
    }
}
