//! Webhook reply generator.
//!
//! `POST {url}` with the conversation context; the collaborator answers with
//! `{"reply": "..."}`.

use std::time::Duration;

use relaydesk_core::relay::reply::ReplyGenerator;
use relaydesk_types::conversation::{Conversation, ConversationId, Platform};
use relaydesk_types::error::ReplyError;
use relaydesk_types::message::Message;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    conversation_id: ConversationId,
    tenant_id: &'a str,
    platform: Platform,
    display_name: String,
    message: &'a str,
}

#[derive(Deserialize)]
struct ReplyResponse {
    #[serde(default)]
    reply: Option<String>,
}

pub struct WebhookReplyGenerator {
    client: reqwest::Client,
    url: String,
}

impl WebhookReplyGenerator {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, url }
    }
}

impl ReplyGenerator for WebhookReplyGenerator {
    async fn generate(&self, conversation: &Conversation, trigger: &Message) -> Result<String, ReplyError> {
        let request = ReplyRequest {
            conversation_id: conversation.id,
            tenant_id: conversation.tenant_id.as_str(),
            platform: conversation.end_user.platform,
            display_name: conversation.display_name(),
            message: &trigger.body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReplyError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Request(format!("HTTP {status}: {error_body}")));
        }

        let body: ReplyResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Request(format!("failed to parse response: {e}")))?;

        let reply = body.reply.filter(|r| !r.trim().is_empty()).ok_or(ReplyError::Empty)?;
        debug!(conversation_id = %conversation.id, chars = reply.len(), "webhook reply received");
        Ok(reply)
    }
}
