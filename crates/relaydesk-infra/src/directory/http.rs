//! Directory client for a remote relay API.
//!
//! `GET {base}/api/v1/users/{tenant}` with the operator identity in the
//! `X-User-Id`, `X-User-Role` and `X-Client-Id` headers. The body is either a
//! bare listing or the relay's `{"success": true, "data": ...}` envelope.

use std::time::Duration;

use relaydesk_core::directory::ConversationDirectory;
use relaydesk_types::auth::AuthUser;
use relaydesk_types::conversation::DirectoryListing;
use relaydesk_types::error::{AuthorizationError, DirectoryError};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum ListingBody {
    Envelope { data: DirectoryListing },
    Bare(DirectoryListing),
}

impl ListingBody {
    fn into_listing(self) -> DirectoryListing {
        match self {
            ListingBody::Envelope { data } => data,
            ListingBody::Bare(listing) => listing,
        }
    }
}

pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ConversationDirectory for HttpDirectory {
    async fn list(&self, user: &AuthUser, tenant: &str) -> Result<DirectoryListing, DirectoryError> {
        // Reject locally first so a misconfigured remote never widens access.
        user.resolve_scope(tenant)?;

        let url = format!("{}/api/v1/users/{}", self.base_url, tenant.trim());
        let mut request = self
            .client
            .get(&url)
            .header("X-User-Id", &user.id)
            .header("X-User-Role", user.role.to_string());
        if let Some(tenant_id) = &user.tenant_id {
            request = request.header("X-Client-Id", tenant_id.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthorizationError::Forbidden(tenant.to_string()).into());
        }
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!("HTTP {status}")));
        }

        let body: ListingBody = response
            .json()
            .await
            .map_err(|e| DirectoryError::Decode(e.without_url().to_string()))?;
        let listing = body.into_listing();

        debug!(operator = %user.id, tenant, conversations = listing.users.len(), "directory listed over http");
        Ok(listing)
    }

    fn name(&self) -> &str {
        "http"
    }
}
