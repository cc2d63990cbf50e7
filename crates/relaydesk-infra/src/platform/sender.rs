//! HttpPlatformSender -- concrete [`PlatformSender`] over reqwest.
//!
//! Each platform has its own wire format:
//!
//! - Telegram: `POST {base}/bot{token}/sendMessage` with
//!   `{chat_id, text, parse_mode: "HTML"}`; success is the body's `ok` flag.
//! - WhatsApp Cloud: `POST {base}/{phone_number_id}/messages` with a bearer
//!   token and a `text` message object.
//! - Instagram: `POST {base}/me/messages` with a bearer token,
//!   `{recipient: {id}, message: {text}}`.
//!
//! Tokens only leave their `SecretString` while building the request.

use std::time::Duration;

use relaydesk_core::relay::delivery::PlatformSender;
use relaydesk_types::config::PlatformEndpoints;
use relaydesk_types::conversation::Platform;
use relaydesk_types::error::PlatformError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
struct TelegramSendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct WhatsAppText<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct WhatsAppMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: WhatsAppText<'a>,
}

#[derive(Serialize)]
struct InstagramRecipient<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct InstagramText<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct InstagramMessage<'a> {
    recipient: InstagramRecipient<'a>,
    message: InstagramText<'a>,
}

/// Platform sender for Telegram, WhatsApp Cloud and Instagram.
pub struct HttpPlatformSender {
    client: reqwest::Client,
    endpoints: PlatformEndpoints,
}

impl HttpPlatformSender {
    pub fn new(endpoints: PlatformEndpoints) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, endpoints }
    }

    async fn send_telegram(&self, token: &SecretString, chat_id: &str, text: &str) -> Result<bool, PlatformError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.endpoints.telegram_api_base.trim_end_matches('/'),
            token.expose_secret()
        );
        let response = self
            .client
            .post(&url)
            .json(&TelegramSendMessage {
                chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| PlatformError::Request(format!("telegram request failed: {}", e.without_url())))?;

        let status = response.status();
        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Request(format!("invalid telegram response: {}", e.without_url())))?;

        if !status.is_success() || !body.ok {
            warn!(
                %status,
                description = body.description.as_deref().unwrap_or(""),
                "telegram rejected message"
            );
            return Ok(false);
        }
        Ok(true)
    }

    async fn send_whatsapp(&self, token: &SecretString, chat_id: &str, text: &str) -> Result<bool, PlatformError> {
        let phone_number_id = self
            .endpoints
            .whatsapp_phone_number_id
            .as_deref()
            .ok_or_else(|| PlatformError::NotConfigured {
                platform: Platform::WhatsApp,
                reason: "whatsapp_phone_number_id is not set".to_string(),
            })?;
        let url = format!(
            "{}/{phone_number_id}/messages",
            self.endpoints.whatsapp_api_base.trim_end_matches('/')
        );
        let body = WhatsAppMessage {
            messaging_product: "whatsapp",
            to: chat_id,
            kind: "text",
            text: WhatsAppText { body: text },
        };
        self.post_bearer(Platform::WhatsApp, &url, token, &body).await
    }

    async fn send_instagram(&self, token: &SecretString, chat_id: &str, text: &str) -> Result<bool, PlatformError> {
        let url = format!(
            "{}/me/messages",
            self.endpoints.instagram_api_base.trim_end_matches('/')
        );
        let body = InstagramMessage {
            recipient: InstagramRecipient { id: chat_id },
            message: InstagramText { text },
        };
        self.post_bearer(Platform::Instagram, &url, token, &body).await
    }

    async fn post_bearer<B: Serialize>(
        &self,
        platform: Platform,
        url: &str,
        token: &SecretString,
        body: &B,
    ) -> Result<bool, PlatformError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| PlatformError::Request(format!("{platform} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(%platform, %status, body = %error_body, "platform rejected message");
            return Ok(false);
        }
        Ok(true)
    }
}

impl PlatformSender for HttpPlatformSender {
    async fn send(
        &self,
        platform: Platform,
        token: &SecretString,
        chat_id: &str,
        text: &str,
    ) -> Result<bool, PlatformError> {
        debug!(%platform, chat_id, "sending platform message");
        match platform {
            Platform::Telegram => self.send_telegram(token, chat_id, text).await,
            Platform::WhatsApp => self.send_whatsapp(token, chat_id, text).await,
            Platform::Instagram => self.send_instagram(token, chat_id, text).await,
        }
    }
}
