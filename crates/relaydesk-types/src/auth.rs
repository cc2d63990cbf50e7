//! Operator identity and tenant visibility rules.
//!
//! The relay does not authenticate anyone. An upstream gateway hands it an
//! opaque [`AuthUser`] descriptor; this module decides which tenants that
//! descriptor may see.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::conversation::TenantId;
use crate::error::AuthorizationError;

/// Operator role as delivered by the identity gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees every tenant.
    PlatformAdmin,
    /// Owns a tenant; the tenant id is the operator's own id.
    TenantOwner,
    /// Works inside a tenant given by an explicit tenant id.
    TenantManager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::PlatformAdmin => write!(f, "platform_admin"),
            Role::TenantOwner => write!(f, "tenant_owner"),
            Role::TenantManager => write!(f, "tenant_manager"),
        }
    }
}

impl FromStr for Role {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "platform_admin" => Ok(Role::PlatformAdmin),
            "tenant_owner" => Ok(Role::TenantOwner),
            "tenant_manager" => Ok(Role::TenantManager),
            other => Err(AuthorizationError::UnknownRole(other.to_string())),
        }
    }
}

/// Opaque operator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
    /// Tenant the operator belongs to (required for tenant managers).
    pub tenant_id: Option<TenantId>,
}

/// Which conversations a query may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    All,
    Tenant(TenantId),
}

impl TenantScope {
    pub fn contains(&self, tenant: &TenantId) -> bool {
        match self {
            TenantScope::All => true,
            TenantScope::Tenant(own) => own == tenant,
        }
    }
}

impl AuthUser {
    /// The tenant this operator is bound to, if the role is tenant-bound.
    pub fn home_tenant(&self) -> Result<Option<TenantId>, AuthorizationError> {
        match self.role {
            Role::PlatformAdmin => Ok(None),
            Role::TenantOwner => Ok(Some(TenantId::new(self.id.clone()))),
            Role::TenantManager => self
                .tenant_id
                .clone()
                .map(Some)
                .ok_or(AuthorizationError::MissingTenant),
        }
    }

    /// Resolve a requested tenant (`"all"` or a tenant id) into a scope.
    ///
    /// Tenant-bound roles asking for `"all"` are narrowed to their own tenant;
    /// asking for somebody else's tenant is rejected.
    pub fn resolve_scope(&self, requested: &str) -> Result<TenantScope, AuthorizationError> {
        let requested = requested.trim();
        match self.home_tenant()? {
            None if requested.eq_ignore_ascii_case("all") => Ok(TenantScope::All),
            None => Ok(TenantScope::Tenant(TenantId::new(requested))),
            Some(own) if requested.eq_ignore_ascii_case("all") || requested == own.as_str() => {
                Ok(TenantScope::Tenant(own))
            }
            Some(_) => Err(AuthorizationError::Forbidden(requested.to_string())),
        }
    }

    /// Scope covering everything this operator may see.
    pub fn default_scope(&self) -> Result<TenantScope, AuthorizationError> {
        self.resolve_scope("all")
    }
}
