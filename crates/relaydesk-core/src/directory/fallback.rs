//! Primary/secondary directory with degraded-mode fallback.

use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::DirectoryListing;
use relaydesk_types::error::DirectoryError;
use tracing::warn;

use super::ConversationDirectory;

/// Tries `primary`; on any failure other than authorization, serves from
/// `secondary`. The switch is logged, never reported to the caller.
pub struct FallbackDirectory<P, S> {
    primary: P,
    secondary: S,
}

impl<P: ConversationDirectory, S: ConversationDirectory> FallbackDirectory<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: ConversationDirectory, S: ConversationDirectory> ConversationDirectory for FallbackDirectory<P, S> {
    async fn list(&self, user: &AuthUser, tenant: &str) -> Result<DirectoryListing, DirectoryError> {
        match self.primary.list(user, tenant).await {
            Ok(listing) => Ok(listing),
            Err(e @ DirectoryError::Unauthorized(_)) => Err(e),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "directory primary failed, using degraded path"
                );
                self.secondary.list(user, tenant).await
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
