use thiserror::Error;

use crate::conversation::{ConversationId, Platform};

/// Errors from repository operations (used by trait definitions in relaydesk-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised while writing to a viewer's channel.
///
/// These never propagate past the session: a dead channel is logged and skipped.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session channel closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("one-way session cannot receive client events")]
    OneWay,
}

/// Absent or insufficient operator identity. Raised before any query runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("missing operator identity")]
    MissingIdentity,

    #[error("unknown role: '{0}'")]
    UnknownRole(String),

    #[error("role requires a tenant id")]
    MissingTenant,

    #[error("not allowed to access tenant '{0}'")]
    Forbidden(String),
}

/// Errors from relaying a message into a conversation.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("conversation {0} not found")]
    ConversationNotFound(ConversationId),

    #[error("message body is empty")]
    EmptyMessage,

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Errors from delivering a message to an end user's messaging platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("no active {platform} bot configured for tenant '{tenant}'")]
    MissingBot { tenant: String, platform: Platform },

    #[error("{platform} is not configured: {reason}")]
    NotConfigured { platform: Platform, reason: String },

    #[error("platform request failed: {0}")]
    Request(String),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Errors from the conversation directory (HTTP or direct store path).
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("invalid directory response: {0}")]
    Decode(String),

    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Errors from generating an automated reply.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply generator request failed: {0}")]
    Request(String),

    #[error("reply generator returned no text")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_relay_error_wraps_store_error() {
        let err: RelayError = RepositoryError::NotFound.into();
        assert!(matches!(err, RelayError::Store(RepositoryError::NotFound)));
        assert_eq!(err.to_string(), "store error: entity not found");
    }

    #[test]
    fn test_platform_error_names_tenant_and_platform() {
        let err = PlatformError::MissingBot {
            tenant: "acme".to_string(),
            platform: Platform::Telegram,
        };
        assert_eq!(
            err.to_string(),
            "no active telegram bot configured for tenant 'acme'"
        );
    }

    #[test]
    fn test_directory_error_is_transparent_for_authorization() {
        let err: DirectoryError = AuthorizationError::Forbidden("acme".to_string()).into();
        assert_eq!(err.to_string(), "not allowed to access tenant 'acme'");
    }
}
