//! Directory served straight from the conversation and message stores.

use std::collections::HashMap;
use std::sync::Arc;

use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::{ConversationId, ConversationSummary, DirectoryListing};
use relaydesk_types::error::DirectoryError;
use tracing::debug;

use super::ConversationDirectory;
use crate::repository::conversation::ConversationRepository;
use crate::repository::message::MessageStore;
use crate::repository::unread_snapshot::UnreadSnapshotStore;
use crate::sort::{sort_conversations, SORTING_DESCRIPTION};
use crate::unread::UnreadEngine;

pub struct StoreDirectory<C, S, K> {
    conversations: Arc<C>,
    unread: UnreadEngine<S, K>,
}

impl<C, S, K> StoreDirectory<C, S, K>
where
    C: ConversationRepository,
    S: MessageStore + 'static,
    K: UnreadSnapshotStore + 'static,
{
    pub fn new(conversations: Arc<C>, unread: UnreadEngine<S, K>) -> Self {
        Self {
            conversations,
            unread,
        }
    }
}

impl<C, S, K> ConversationDirectory for StoreDirectory<C, S, K>
where
    C: ConversationRepository,
    S: MessageStore + 'static,
    K: UnreadSnapshotStore + 'static,
{
    async fn list(&self, user: &AuthUser, tenant: &str) -> Result<DirectoryListing, DirectoryError> {
        let scope = user.resolve_scope(tenant)?;
        let conversations = self.conversations.list(&scope).await?;

        let ids: Vec<ConversationId> = conversations.iter().map(|c| c.id).collect();
        let states = self.unread.get_all_states(&ids).await?;

        let counts: HashMap<_, _> = states.iter().map(|(id, s)| (*id, s.count)).collect();
        let times: HashMap<_, _> = states
            .iter()
            .filter_map(|(id, s)| s.last_message_at.map(|at| (*id, at)))
            .collect();

        let users = sort_conversations(conversations, &counts, &times)
            .into_iter()
            .map(|conversation| ConversationSummary {
                display_name: conversation.display_name(),
                unread_count: counts.get(&conversation.id).copied().unwrap_or(0),
                last_message_time: times.get(&conversation.id).copied(),
                status: conversation.status(),
                conversation,
            })
            .collect::<Vec<_>>();

        debug!(operator = %user.id, tenant, conversations = users.len(), "directory listed from store");
        Ok(DirectoryListing {
            users,
            sorting: SORTING_DESCRIPTION.to_string(),
        })
    }

    fn name(&self) -> &str {
        "store"
    }
}
