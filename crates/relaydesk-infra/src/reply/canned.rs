//! Fixed-template reply generator, used when no webhook is configured.

use relaydesk_core::relay::reply::ReplyGenerator;
use relaydesk_types::conversation::Conversation;
use relaydesk_types::error::ReplyError;
use relaydesk_types::message::Message;

const DEFAULT_TEMPLATE: &str = "Thanks, {name}! We received your message and will reply shortly.";

/// Renders a template with `{name}` and `{message}` placeholders.
#[derive(Debug, Clone)]
pub struct CannedReplyGenerator {
    template: String,
}

impl CannedReplyGenerator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, conversation: &Conversation, trigger: &Message) -> String {
        self.template
            .replace("{name}", &conversation.display_name())
            .replace("{message}", trigger.body.trim())
    }
}

impl Default for CannedReplyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl ReplyGenerator for CannedReplyGenerator {
    async fn generate(&self, conversation: &Conversation, trigger: &Message) -> Result<String, ReplyError> {
        let text = self.render(conversation, trigger);
        if text.trim().is_empty() {
            return Err(ReplyError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use relaydesk_types::conversation::{Conversation, ConversationId, EndUser, Platform, TenantId};
    use relaydesk_types::message::{Message, MessageId, SenderRole};

    pub fn conversation(name: Option<&str>) -> Conversation {
        Conversation {
            id: ConversationId(7),
            tenant_id: TenantId::new("acme"),
            end_user: EndUser {
                external_id: "u-7".into(),
                name: name.map(str::to_string),
                username: None,
                nickname: None,
                platform: Platform::Telegram,
                chat_id: "c-7".into(),
            },
            human_required: false,
            automation_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn message(body: &str) -> Message {
        Message {
            id: MessageId(1),
            conversation_id: ConversationId(7),
            body: body.to_string(),
            sender: SenderRole::User,
            created_at: Utc::now(),
            response: None,
            responded_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{conversation, message};
    use super::*;

    #[tokio::test]
    async fn test_default_template_uses_display_name() {
        let generator = CannedReplyGenerator::default();
        let text = generator
            .generate(&conversation(Some("Ann")), &message("where is my order?"))
            .await
            .unwrap();
        assert_eq!(text, "Thanks, Ann! We received your message and will reply shortly.");
    }

    #[tokio::test]
    async fn test_custom_template_echoes_message() {
        let generator = CannedReplyGenerator::new("Re: {message}");
        let text = generator
            .generate(&conversation(None), &message("  ping "))
            .await
            .unwrap();
        assert_eq!(text, "Re: ping");
    }

    #[tokio::test]
    async fn test_blank_render_is_error() {
        let generator = CannedReplyGenerator::new("{message}");
        let err = generator.generate(&conversation(None), &message(" ")).await.unwrap_err();
        assert!(matches!(err, ReplyError::Empty));
    }
}
