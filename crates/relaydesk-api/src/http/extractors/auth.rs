//! Operator identity extractor.
//!
//! The relay trusts an upstream gateway to authenticate operators. The
//! gateway forwards the identity in three headers:
//!
//! - `X-User-Id`: operator id (required)
//! - `X-User-Role`: `platform_admin`, `tenant_owner` or `tenant_manager` (required)
//! - `X-Client-Id`: tenant id, required for tenant managers

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use relaydesk_types::auth::{AuthUser, Role};
use relaydesk_types::conversation::TenantId;
use relaydesk_types::error::AuthorizationError;

use crate::http::error::AppError;

/// The calling operator. Extraction fails with 401 when identity headers are absent.
pub struct Operator(pub AuthUser);

impl<S> FromRequestParts<S> for Operator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Operator(identity_from_parts(parts)?))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build an [`AuthUser`] from the identity headers.
pub fn identity_from_parts(parts: &Parts) -> Result<AuthUser, AuthorizationError> {
    let id = header(parts, "x-user-id").ok_or(AuthorizationError::MissingIdentity)?;
    let role: Role = header(parts, "x-user-role")
        .ok_or(AuthorizationError::MissingIdentity)?
        .parse()?;
    let tenant_id = header(parts, "x-client-id").map(TenantId::new);

    let user = AuthUser {
        id: id.to_string(),
        role,
        tenant_id,
    };
    // Reject a manager without a tenant at the edge.
    user.home_tenant()?;
    Ok(user)
}
