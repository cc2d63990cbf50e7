//! SQLite platform bot repository implementation.
//!
//! Tokens are stored as given; the caller's data directory is expected to be
//! private to the service account.

use relaydesk_core::repository::platform_bot::{PlatformBot, PlatformBotRepository};
use relaydesk_types::conversation::{Platform, TenantId};
use relaydesk_types::error::RepositoryError;
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `PlatformBotRepository`.
pub struct SqlitePlatformBotRepository {
    pool: DatabasePool,
}

impl SqlitePlatformBotRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct PlatformBotRow {
    id: String,
    tenant_id: String,
    platform: String,
    name: String,
    token: String,
    is_active: bool,
    created_at: String,
}

impl PlatformBotRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            platform: row.try_get("platform")?,
            name: row.try_get("name")?,
            token: row.try_get("token")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_bot(self) -> Result<PlatformBot, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid bot id: {e}")))?;
        let platform: Platform = self.platform.parse().map_err(RepositoryError::Query)?;
        Ok(PlatformBot {
            id,
            tenant_id: TenantId::new(self.tenant_id),
            platform,
            name: self.name,
            token: SecretString::from(self.token),
            is_active: self.is_active,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl PlatformBotRepository for SqlitePlatformBotRepository {
    async fn find_active(
        &self,
        tenant_id: &TenantId,
        platform: Platform,
    ) -> Result<Option<PlatformBot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM platform_bots WHERE tenant_id = ? AND platform = ? AND is_active = 1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(tenant_id.as_str())
        .bind(platform.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_error)?;

        row.map(|row| PlatformBotRow::from_row(&row).map_err(query_error)?.into_bot())
            .transpose()
    }

    async fn save(&self, bot: &PlatformBot) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        if bot.is_active {
            sqlx::query(
                "UPDATE platform_bots SET is_active = 0 WHERE tenant_id = ? AND platform = ? AND id != ?",
            )
            .bind(bot.tenant_id.as_str())
            .bind(bot.platform.to_string())
            .bind(bot.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        sqlx::query(
            "INSERT INTO platform_bots (id, tenant_id, platform, name, token, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 token = excluded.token,
                 is_active = excluded.is_active",
        )
        .bind(bot.id.to_string())
        .bind(bot.tenant_id.as_str())
        .bind(bot.platform.to_string())
        .bind(&bot.name)
        .bind(bot.token.expose_secret())
        .bind(bot.is_active)
        .bind(format_datetime(&bot.created_at))
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        tx.commit().await.map_err(query_error)
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<PlatformBot>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM platform_bots WHERE tenant_id = ? ORDER BY created_at DESC")
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| PlatformBotRow::from_row(row).map_err(query_error)?.into_bot())
            .collect()
    }
}
