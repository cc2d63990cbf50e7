//! Durable unread snapshot store trait.
//!
//! Holds the last computed unread state per conversation so a restarted
//! process can serve counts before its first recompute.

use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::RepositoryError;
use relaydesk_types::unread::UnreadSnapshot;

pub trait UnreadSnapshotStore: Send + Sync {
    /// Load every stored snapshot. Freshness is judged by the caller.
    fn load_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<UnreadSnapshot>, RepositoryError>> + Send;

    /// Insert or replace the snapshot of one conversation.
    fn save(
        &self,
        snapshot: &UnreadSnapshot,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove one conversation's snapshot. No-op if absent.
    fn remove(
        &self,
        conversation_id: ConversationId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove all snapshots.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
