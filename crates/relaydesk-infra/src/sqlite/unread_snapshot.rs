//! SQLite unread snapshot store.
//!
//! One row per conversation holding the last computed unread state and when
//! it was computed. Freshness is judged by the reader.

use relaydesk_core::repository::unread_snapshot::UnreadSnapshotStore;
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::RepositoryError;
use relaydesk_types::unread::{UnreadSnapshot, UnreadState};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `UnreadSnapshotStore`.
pub struct SqliteUnreadSnapshotStore {
    pool: DatabasePool,
}

impl SqliteUnreadSnapshotStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct SnapshotRow {
    conversation_id: i64,
    unread_count: i64,
    last_message_time: Option<String>,
    last_response_time: Option<String>,
    cached_at: String,
}

impl SnapshotRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            conversation_id: row.try_get("conversation_id")?,
            unread_count: row.try_get("unread_count")?,
            last_message_time: row.try_get("last_message_time")?,
            last_response_time: row.try_get("last_response_time")?,
            cached_at: row.try_get("cached_at")?,
        })
    }

    fn into_snapshot(self) -> Result<UnreadSnapshot, RepositoryError> {
        let count = u32::try_from(self.unread_count)
            .map_err(|e| RepositoryError::Query(format!("invalid unread count: {e}")))?;
        Ok(UnreadSnapshot {
            conversation_id: ConversationId(self.conversation_id),
            state: UnreadState {
                count,
                last_message_at: self.last_message_time.as_deref().map(parse_datetime).transpose()?,
                last_response_at: self.last_response_time.as_deref().map(parse_datetime).transpose()?,
            },
            cached_at: parse_datetime(&self.cached_at)?,
        })
    }
}

impl UnreadSnapshotStore for SqliteUnreadSnapshotStore {
    async fn load_all(&self) -> Result<Vec<UnreadSnapshot>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM unread_snapshots")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| SnapshotRow::from_row(row).map_err(query_error)?.into_snapshot())
            .collect()
    }

    async fn save(&self, snapshot: &UnreadSnapshot) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO unread_snapshots (conversation_id, unread_count, last_message_time, last_response_time, cached_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (conversation_id) DO UPDATE SET
                 unread_count = excluded.unread_count,
                 last_message_time = excluded.last_message_time,
                 last_response_time = excluded.last_response_time,
                 cached_at = excluded.cached_at",
        )
        .bind(snapshot.conversation_id.0)
        .bind(i64::from(snapshot.state.count))
        .bind(snapshot.state.last_message_at.as_ref().map(format_datetime))
        .bind(snapshot.state.last_response_at.as_ref().map(format_datetime))
        .bind(format_datetime(&snapshot.cached_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn remove(&self, conversation_id: ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM unread_snapshots WHERE conversation_id = ?")
            .bind(conversation_id.0)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM unread_snapshots")
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(())
    }
}
