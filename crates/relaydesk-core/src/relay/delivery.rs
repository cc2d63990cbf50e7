//! Outbound delivery to the end user's messaging platform.

use relaydesk_types::conversation::{Conversation, Platform};
use relaydesk_types::error::PlatformError;
use secrecy::SecretString;

use crate::repository::platform_bot::PlatformBotRepository;

/// Sends text to a chat on a messaging platform.
///
/// Returns `Ok(false)` when the platform answered but refused the message.
pub trait PlatformSender: Send + Sync {
    fn send(
        &self,
        platform: Platform,
        token: &SecretString,
        chat_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<bool, PlatformError>> + Send;
}

/// Delivers a conversation message to its end user.
pub trait OutboundDelivery: Send + Sync {
    fn deliver(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> impl std::future::Future<Output = Result<bool, PlatformError>> + Send;
}

/// Delivery through the tenant's active bot on the conversation's platform.
pub struct PlatformDelivery<B: PlatformBotRepository, P: PlatformSender> {
    bots: B,
    sender: P,
}

impl<B: PlatformBotRepository, P: PlatformSender> PlatformDelivery<B, P> {
    pub fn new(bots: B, sender: P) -> Self {
        Self { bots, sender }
    }

    pub fn bots(&self) -> &B {
        &self.bots
    }
}

impl<B: PlatformBotRepository, P: PlatformSender> OutboundDelivery for PlatformDelivery<B, P> {
    async fn deliver(&self, conversation: &Conversation, text: &str) -> Result<bool, PlatformError> {
        let platform = conversation.end_user.platform;
        let bot = self
            .bots
            .find_active(&conversation.tenant_id, platform)
            .await?
            .ok_or_else(|| PlatformError::MissingBot {
                tenant: conversation.tenant_id.to_string(),
                platform,
            })?;

        self.sender
            .send(platform, &bot.token, &conversation.end_user.chat_id, text)
            .await
    }
}
