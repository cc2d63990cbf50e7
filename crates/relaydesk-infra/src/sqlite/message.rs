//! SQLite message store with an in-process change feed.
//!
//! Implements `MessageStore` from `relaydesk-core`. Every committed write is
//! published on a [`ChangeFeed`] as an `INSERT` or `UPDATE` event carrying
//! the full row (and the previous row for updates).

use chrono::{DateTime, Duration, SubsecRound, Utc};
use relaydesk_core::event::ChangeFeed;
use relaydesk_core::repository::SortOrder;
use relaydesk_core::repository::message::{MessageFilter, MessageStore};
use relaydesk_types::conversation::ConversationId;
use relaydesk_types::error::RepositoryError;
use relaydesk_types::message::{ChangeEvent, Message, MessageId, NewMessage, SenderRole};
use sqlx::Row;
use tokio::sync::broadcast;
use tracing::debug;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `MessageStore`.
pub struct SqliteMessageStore {
    pool: DatabasePool,
    feed: ChangeFeed,
}

impl SqliteMessageStore {
    pub fn new(pool: DatabasePool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct MessageRow {
    id: i64,
    conversation_id: i64,
    body: String,
    sender: String,
    created_at: String,
    response: Option<String>,
    responded_at: Option<String>,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            body: row.try_get("body")?,
            sender: row.try_get("sender")?,
            created_at: row.try_get("created_at")?,
            response: row.try_get("response")?,
            responded_at: row.try_get("responded_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let sender: SenderRole = self.sender.parse().map_err(RepositoryError::Query)?;
        Ok(Message {
            id: MessageId(self.id),
            conversation_id: ConversationId(self.conversation_id),
            body: self.body,
            sender,
            created_at: parse_datetime(&self.created_at)?,
            response: self.response,
            responded_at: self.responded_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn map_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    rows.iter()
        .map(|row| MessageRow::from_row(row).map_err(query_error)?.into_message())
        .collect()
}

const SELECT_MESSAGE: &str =
    "SELECT id, conversation_id, body, sender, created_at, response, responded_at FROM messages";

impl MessageStore for SqliteMessageStore {
    async fn insert(&self, message: &NewMessage) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        // The writer pool has one connection, so reading the high-water mark
        // and inserting inside one transaction yields strictly increasing stamps.
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(created_at) FROM messages")
            .fetch_one(&mut *tx)
            .await
            .map_err(query_error)?;
        let mut created_at = Utc::now().trunc_subsecs(6);
        if let Some(latest) = latest.as_deref().map(parse_datetime).transpose()? {
            if created_at <= latest {
                created_at = latest + Duration::microseconds(1);
            }
        }

        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, body, sender, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(message.conversation_id.0)
        .bind(&message.body)
        .bind(message.sender.to_string())
        .bind(format_datetime(&created_at))
        .execute(&mut *tx)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                return Err(RepositoryError::NotFound);
            }
            Err(e) => return Err(query_error(e)),
        };
        tx.commit().await.map_err(query_error)?;

        let stored = Message {
            id: MessageId(result.last_insert_rowid()),
            conversation_id: message.conversation_id,
            body: message.body.clone(),
            sender: message.sender,
            created_at,
            response: None,
            responded_at: None,
        };
        debug!(conversation_id = %stored.conversation_id, message_id = %stored.id, "message inserted");
        self.feed.publish(ChangeEvent::inserted(stored.clone()));
        Ok(stored)
    }

    async fn query(&self, filter: &MessageFilter, order: SortOrder) -> Result<Vec<Message>, RepositoryError> {
        let mut sql = String::from(SELECT_MESSAGE);
        let mut conditions: Vec<String> = Vec::new();

        if !filter.conversation_ids.is_empty() {
            let placeholders = vec!["?"; filter.conversation_ids.len()].join(", ");
            conditions.push(format!("conversation_id IN ({placeholders})"));
        }
        if filter.sender.is_some() {
            conditions.push("sender = ?".to_string());
        }
        if filter.after.is_some() {
            conditions.push("created_at > ?".to_string());
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        sql.push_str(&format!(" ORDER BY created_at {direction}, id {direction}"));
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit.max(0)));
        }

        let mut query = sqlx::query(&sql);
        for id in &filter.conversation_ids {
            query = query.bind(id.0);
        }
        if let Some(sender) = filter.sender {
            query = query.bind(sender.to_string());
        }
        if let Some(after) = filter.after {
            query = query.bind(format_datetime(&after));
        }

        let rows = query.fetch_all(&self.pool.reader).await.map_err(query_error)?;
        map_rows(&rows)
    }

    async fn link_response(
        &self,
        conversation_id: ConversationId,
        response: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Message>, RepositoryError> {
        let at = at.trunc_subsecs(6);
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let row = sqlx::query(&format!(
            "{SELECT_MESSAGE} WHERE conversation_id = ? AND sender = 'user'
             AND (response IS NULL OR TRIM(response) = '')
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(conversation_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let old = MessageRow::from_row(&row).map_err(query_error)?.into_message()?;

        sqlx::query("UPDATE messages SET response = ?, responded_at = ? WHERE id = ?")
            .bind(response)
            .bind(format_datetime(&at))
            .bind(old.id.0)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        tx.commit().await.map_err(query_error)?;

        let new = Message {
            response: Some(response.to_string()),
            responded_at: Some(at),
            ..old.clone()
        };
        debug!(%conversation_id, message_id = %new.id, "response linked");
        self.feed.publish(ChangeEvent::updated(old, new.clone()));
        Ok(Some(new))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}
