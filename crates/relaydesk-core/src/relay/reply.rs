//! Automated reply generation capability.

use relaydesk_types::conversation::Conversation;
use relaydesk_types::error::ReplyError;
use relaydesk_types::message::Message;

/// Produces the bot's answer to an inbound user message.
///
/// Implementations live in relaydesk-infra (webhook, canned).
pub trait ReplyGenerator: Send + Sync {
    fn generate(
        &self,
        conversation: &Conversation,
        trigger: &Message,
    ) -> impl std::future::Future<Output = Result<String, ReplyError>> + Send;
}
