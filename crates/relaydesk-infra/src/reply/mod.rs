//! Automated reply generators.
//!
//! [`ConfiguredReplyGenerator`] picks the webhook generator when a webhook
//! URL is configured and the canned generator otherwise.

pub mod canned;
pub mod webhook;

use relaydesk_core::relay::reply::ReplyGenerator;
use relaydesk_types::config::RelayConfig;
use relaydesk_types::conversation::Conversation;
use relaydesk_types::error::ReplyError;
use relaydesk_types::message::Message;

pub use canned::CannedReplyGenerator;
pub use webhook::WebhookReplyGenerator;

pub enum ConfiguredReplyGenerator {
    Webhook(WebhookReplyGenerator),
    Canned(CannedReplyGenerator),
}

impl ConfiguredReplyGenerator {
    pub fn from_config(config: &RelayConfig) -> Self {
        match config.reply_webhook_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Self::Webhook(WebhookReplyGenerator::new(url.to_string())),
            _ => Self::Canned(CannedReplyGenerator::default()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Webhook(_) => "webhook",
            Self::Canned(_) => "canned",
        }
    }
}

impl ReplyGenerator for ConfiguredReplyGenerator {
    async fn generate(&self, conversation: &Conversation, trigger: &Message) -> Result<String, ReplyError> {
        match self {
            Self::Webhook(generator) => generator.generate(conversation, trigger).await,
            Self::Canned(generator) => generator.generate(conversation, trigger).await,
        }
    }
}
