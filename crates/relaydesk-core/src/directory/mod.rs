//! Conversation directory: the sorted, unread-enriched conversation list.
//!
//! The primary path is an HTTP collaborator (relaydesk-infra); the
//! secondary path queries the stores directly. [`FallbackDirectory`]
//! switches to the secondary path when the primary is unreachable.

pub mod fallback;
pub mod store;

use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::DirectoryListing;
use relaydesk_types::error::DirectoryError;

pub use fallback::FallbackDirectory;
pub use store::StoreDirectory;

/// Lists the conversations an operator may see, in display order.
///
/// `tenant` is a tenant id or `"all"`. Authorization failures are returned
/// before any query runs.
pub trait ConversationDirectory: Send + Sync {
    fn list(
        &self,
        user: &AuthUser,
        tenant: &str,
    ) -> impl std::future::Future<Output = Result<DirectoryListing, DirectoryError>> + Send;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

impl<T: ConversationDirectory> ConversationDirectory for std::sync::Arc<T> {
    fn list(
        &self,
        user: &AuthUser,
        tenant: &str,
    ) -> impl std::future::Future<Output = Result<DirectoryListing, DirectoryError>> + Send {
        (**self).list(user, tenant)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
