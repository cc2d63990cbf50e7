//! Conversation list ordering.
//!
//! A pure, total order over conversations derived only from its inputs:
//! escalated first, then unread before read, then more unread first, then
//! most recent activity, then display name. Conversation id breaks any
//! remaining tie so no two distinct conversations compare equal.
//!
//! Names compare accent- and case-insensitively first ("Émile" sits with
//! "emile", before "Zoe"), then exactly. This is a locale-neutral collation:
//! per-language tailoring (e.g. Swedish "å" after "z") is not applied.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relaydesk_types::conversation::{Conversation, ConversationId};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Human-readable description of the ordering, returned by the directory.
pub const SORTING_DESCRIPTION: &str =
    "human_required desc, unread desc, unread_count desc, last_message_time desc, name asc";

/// Sort key of one conversation, resolved from the lookup maps.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SortKey {
    escalated: bool,
    unread: u32,
    last_message_at: Option<DateTime<Utc>>,
    folded_name: String,
    name: String,
    id: ConversationId,
}

impl SortKey {
    fn new(
        conversation: &Conversation,
        unread_counts: &HashMap<ConversationId, u32>,
        last_message_times: &HashMap<ConversationId, DateTime<Utc>>,
    ) -> Self {
        let name = conversation.display_name();
        Self {
            escalated: conversation.human_required,
            unread: unread_counts.get(&conversation.id).copied().unwrap_or(0),
            last_message_at: last_message_times.get(&conversation.id).copied(),
            folded_name: fold(&name),
            name,
            id: conversation.id,
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        other
            .escalated
            .cmp(&self.escalated)
            .then_with(|| (other.unread > 0).cmp(&(self.unread > 0)))
            .then_with(|| other.unread.cmp(&self.unread))
            .then_with(|| match (self.last_message_at, other.last_message_at) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.folded_name.cmp(&other.folded_name))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Decompose, drop combining marks, lowercase.
fn fold(name: &str) -> String {
    name.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare two conversations under the list ordering.
pub fn compare_conversations(
    a: &Conversation,
    b: &Conversation,
    unread_counts: &HashMap<ConversationId, u32>,
    last_message_times: &HashMap<ConversationId, DateTime<Utc>>,
) -> Ordering {
    SortKey::new(a, unread_counts, last_message_times)
        .cmp(&SortKey::new(b, unread_counts, last_message_times))
}

/// Order conversations for display. Missing counts read as zero and missing
/// times sort after present ones.
pub fn sort_conversations(
    conversations: Vec<Conversation>,
    unread_counts: &HashMap<ConversationId, u32>,
    last_message_times: &HashMap<ConversationId, DateTime<Utc>>,
) -> Vec<Conversation> {
    let mut keyed: Vec<(SortKey, Conversation)> = conversations
        .into_iter()
        .map(|c| (SortKey::new(&c, unread_counts, last_message_times), c))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    keyed.into_iter().map(|(_, c)| c).collect()
}
