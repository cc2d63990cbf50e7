//! Relay configuration types.
//!
//! `RelayConfig` represents the top-level `config.toml` that controls
//! timers, cache horizons and the outbound endpoints the relay talks to.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Smallest visible delay before an automated reply is published.
pub const MIN_BOT_REPLY_DELAY_MS: u64 = 1_000;

/// Smallest heartbeat interval accepted on one-way streams.
pub const MIN_HEARTBEAT_INTERVAL_SECS: u64 = 1;

/// Top-level configuration for the relay.
///
/// Loaded from `~/.relaydesk/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Seconds between heartbeat frames on one-way streams.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// How long a persisted unread snapshot stays readable.
    #[serde(default = "default_unread_cache_horizon_secs")]
    pub unread_cache_horizon_secs: u64,

    /// Visible delay before an automated reply is published.
    #[serde(default = "default_bot_reply_delay_ms")]
    pub bot_reply_delay_ms: u64,

    /// Buffer size of the message change feed.
    #[serde(default = "default_change_feed_capacity")]
    pub change_feed_capacity: usize,

    /// Base URL of the conversation directory API (primary path of `rdesk inbox`).
    #[serde(default)]
    pub directory_url: Option<String>,

    /// Endpoint that generates automated replies. Canned replies when unset.
    #[serde(default)]
    pub reply_webhook_url: Option<String>,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub platforms: PlatformEndpoints,
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_unread_cache_horizon_secs() -> u64 {
    300
}

fn default_bot_reply_delay_ms() -> u64 {
    MIN_BOT_REPLY_DELAY_MS
}

fn default_change_feed_capacity() -> usize {
    1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            unread_cache_horizon_secs: default_unread_cache_horizon_secs(),
            bot_reply_delay_ms: default_bot_reply_delay_ms(),
            change_feed_capacity: default_change_feed_capacity(),
            directory_url: None,
            reply_webhook_url: None,
            cors_origins: Vec::new(),
            platforms: PlatformEndpoints::default(),
        }
    }
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(MIN_HEARTBEAT_INTERVAL_SECS))
    }

    pub fn unread_cache_horizon(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.unread_cache_horizon_secs as i64)
    }

    /// Automated reply delay, never below [`MIN_BOT_REPLY_DELAY_MS`].
    pub fn bot_reply_delay(&self) -> Duration {
        Duration::from_millis(self.bot_reply_delay_ms.max(MIN_BOT_REPLY_DELAY_MS))
    }

    pub fn change_feed_capacity(&self) -> usize {
        self.change_feed_capacity.max(16)
    }
}

/// Base URLs of the messaging platform APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEndpoints {
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    #[serde(default = "default_whatsapp_api_base")]
    pub whatsapp_api_base: String,

    /// WhatsApp Cloud API sender number. WhatsApp delivery is disabled when unset.
    #[serde(default)]
    pub whatsapp_phone_number_id: Option<String>,

    #[serde(default = "default_instagram_api_base")]
    pub instagram_api_base: String,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_instagram_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            telegram_api_base: default_telegram_api_base(),
            whatsapp_api_base: default_whatsapp_api_base(),
            whatsapp_phone_number_id: None,
            instagram_api_base: default_instagram_api_base(),
        }
    }
}
