//! Platform bot repository trait definition.
//!
//! A platform bot is a tenant's account on a messaging platform (a Telegram
//! bot token, a WhatsApp Cloud access token, ...). Outbound delivery looks up
//! the active bot for `(tenant, platform)`.

use chrono::{DateTime, Utc};
use relaydesk_types::conversation::{Platform, TenantId};
use relaydesk_types::error::RepositoryError;
use secrecy::SecretString;
use uuid::Uuid;

/// A tenant's credentials on one messaging platform.
#[derive(Debug, Clone)]
pub struct PlatformBot {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub platform: Platform,
    pub name: String,
    pub token: SecretString,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for platform bot credentials.
pub trait PlatformBotRepository: Send + Sync {
    /// The active bot of a tenant on a platform, if any.
    fn find_active(
        &self,
        tenant_id: &TenantId,
        platform: Platform,
    ) -> impl std::future::Future<Output = Result<Option<PlatformBot>, RepositoryError>> + Send;

    /// Insert or replace a bot. Activating a bot deactivates the tenant's
    /// other bots on the same platform.
    fn save(
        &self,
        bot: &PlatformBot,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List a tenant's bots, newest first.
    fn list(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<PlatformBot>, RepositoryError>> + Send;
}
