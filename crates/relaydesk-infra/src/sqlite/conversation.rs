//! SQLite conversation repository implementation.

use chrono::Utc;
use relaydesk_core::repository::conversation::ConversationRepository;
use relaydesk_types::auth::TenantScope;
use relaydesk_types::conversation::{
    Conversation, ConversationId, EndUser, InboundMessage, Platform, TenantId,
};
use relaydesk_types::error::RepositoryError;
use sqlx::Row;
use tracing::info;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn set_flag(&self, id: ConversationId, column: &str, value: bool) -> Result<Conversation, RepositoryError> {
        let result = sqlx::query(&format!(
            "UPDATE conversations SET {column} = ?, updated_at = ? WHERE id = ?"
        ))
        .bind(value)
        .bind(format_datetime(&Utc::now()))
        .bind(id.0)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(conversation_id = %id, column, value, "conversation flag updated");

        // Read back on the writer so the update is visible immediately.
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.0)
            .fetch_one(&self.pool.writer)
            .await
            .map_err(query_error)?;
        ConversationRow::from_row(&row)
            .map_err(query_error)?
            .into_conversation()
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: i64,
    tenant_id: String,
    platform: String,
    external_id: String,
    chat_id: String,
    name: Option<String>,
    username: Option<String>,
    nickname: Option<String>,
    human_required: bool,
    automation_enabled: bool,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            platform: row.try_get("platform")?,
            external_id: row.try_get("external_id")?,
            chat_id: row.try_get("chat_id")?,
            name: row.try_get("name")?,
            username: row.try_get("username")?,
            nickname: row.try_get("nickname")?,
            human_required: row.try_get("human_required")?,
            automation_enabled: row.try_get("automation_enabled")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let platform: Platform = self.platform.parse().map_err(RepositoryError::Query)?;
        Ok(Conversation {
            id: ConversationId(self.id),
            tenant_id: TenantId::new(self.tenant_id),
            end_user: EndUser {
                external_id: self.external_id,
                name: self.name,
                username: self.username,
                nickname: self.nickname,
                platform,
                chat_id: self.chat_id,
            },
            human_required: self.human_required,
            automation_enabled: self.automation_enabled,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl ConversationRepository for SqliteConversationRepository {
    async fn get(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let conv_row = ConversationRow::from_row(&row).map_err(query_error)?;
                Ok(Some(conv_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, scope: &TenantScope) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = match scope {
            TenantScope::All => {
                sqlx::query("SELECT * FROM conversations ORDER BY created_at ASC, id ASC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
            TenantScope::Tenant(tenant) => {
                sqlx::query(
                    "SELECT * FROM conversations WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
                )
                .bind(tenant.as_str())
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(query_error)?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conv_row = ConversationRow::from_row(row).map_err(query_error)?;
            conversations.push(conv_row.into_conversation()?);
        }
        Ok(conversations)
    }

    async fn upsert_from_inbound(&self, inbound: &InboundMessage) -> Result<Conversation, RepositoryError> {
        let platform = Platform::normalize(&inbound.platform);
        let now = format_datetime(&Utc::now());

        let row = sqlx::query(
            "INSERT INTO conversations (tenant_id, platform, external_id, chat_id, name, username, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, platform, external_id) DO UPDATE SET
                 chat_id = excluded.chat_id,
                 name = COALESCE(excluded.name, conversations.name),
                 username = COALESCE(excluded.username, conversations.username),
                 updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(inbound.tenant_id.as_str())
        .bind(platform.to_string())
        .bind(&inbound.external_id)
        .bind(&inbound.chat_id)
        .bind(&inbound.name)
        .bind(&inbound.username)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(query_error)?;

        ConversationRow::from_row(&row)
            .map_err(query_error)?
            .into_conversation()
    }

    async fn set_escalation(&self, id: ConversationId, human_required: bool) -> Result<Conversation, RepositoryError> {
        self.set_flag(id, "human_required", human_required).await
    }

    async fn set_automation(&self, id: ConversationId, enabled: bool) -> Result<Conversation, RepositoryError> {
        self.set_flag(id, "automation_enabled", enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;
    use relaydesk_types::conversation::ConversationStatus;

    fn inbound(tenant: &str, platform: &str, external_id: &str, name: Option<&str>) -> InboundMessage {
        InboundMessage {
            tenant_id: TenantId::new(tenant),
            platform: platform.to_string(),
            external_id: external_id.to_string(),
            chat_id: format!("chat-{external_id}"),
            name: name.map(str::to_string),
            username: None,
            text: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_once_per_sender() {
        let repo = SqliteConversationRepository::new(test_pool().await);

        let first = repo.upsert_from_inbound(&inbound("acme", "tg", "u1", Some("Ann"))).await.unwrap();
        assert_eq!(first.end_user.platform, Platform::Telegram);
        assert!(first.automation_enabled);
        assert!(!first.human_required);

        let again = repo.upsert_from_inbound(&inbound("acme", "telegram", "u1", None)).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.end_user.name.as_deref(), Some("Ann"));

        let other_platform = repo.upsert_from_inbound(&inbound("acme", "insta", "u1", None)).await.unwrap();
        assert_ne!(other_platform.id, first.id);
    }

    #[tokio::test]
    async fn test_list_respects_scope() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        repo.upsert_from_inbound(&inbound("acme", "wa", "u1", None)).await.unwrap();
        repo.upsert_from_inbound(&inbound("globex", "wa", "u2", None)).await.unwrap();
        repo.upsert_from_inbound(&inbound("acme", "wa", "u3", None)).await.unwrap();

        assert_eq!(repo.list(&TenantScope::All).await.unwrap().len(), 3);
        let acme = repo
            .list(&TenantScope::Tenant(TenantId::new("acme")))
            .await
            .unwrap();
        assert_eq!(
            acme.iter().map(|c| c.end_user.external_id.as_str()).collect::<Vec<_>>(),
            vec!["u1", "u3"]
        );
    }

    #[tokio::test]
    async fn test_flags_update_and_status() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let conv = repo.upsert_from_inbound(&inbound("acme", "tg", "u1", None)).await.unwrap();

        let escalated = repo.set_escalation(conv.id, true).await.unwrap();
        assert_eq!(escalated.status(), ConversationStatus::HumanRequired);

        repo.set_escalation(conv.id, false).await.unwrap();
        let offline = repo.set_automation(conv.id, false).await.unwrap();
        assert_eq!(offline.status(), ConversationStatus::Offline);

        let stored = repo.get(conv.id).await.unwrap().unwrap();
        assert!(!stored.automation_enabled);
    }

    #[tokio::test]
    async fn test_flags_on_unknown_conversation() {
        let repo = SqliteConversationRepository::new(test_pool().await);
        let err = repo.set_escalation(ConversationId(404), true).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
        assert!(repo.get(ConversationId(404)).await.unwrap().is_none());
    }
}
