use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Identifier of a conversation (one end user's chat thread, also the fan-out room).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Identifier of the tenant (client account) that owns a set of conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Messaging platform an end user reaches the relay through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Instagram,
}

impl Platform {
    /// Map a free-form platform label to a platform.
    ///
    /// Accepts the usual short forms (`tg`, `wa`, `ig`, `insta`, ...).
    /// Anything unrecognised is treated as WhatsApp.
    pub fn normalize(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "telegram" | "tg" => Platform::Telegram,
            "instagram" | "ig" | "insta" => Platform::Instagram,
            _ => Platform::WhatsApp,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Telegram => write!(f, "telegram"),
            Platform::WhatsApp => write!(f, "whatsapp"),
            Platform::Instagram => write!(f, "instagram"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "telegram" => Ok(Platform::Telegram),
            "whatsapp" => Ok(Platform::WhatsApp),
            "instagram" => Ok(Platform::Instagram),
            other => Err(format!("invalid platform: '{other}'")),
        }
    }
}

/// The end user on the other side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndUser {
    /// Platform-side user identifier.
    pub external_id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    /// Operator-assigned label; wins over the platform name when present.
    pub nickname: Option<String>,
    pub platform: Platform,
    /// Platform chat the end user writes from (Telegram chat id, WhatsApp number, ...).
    pub chat_id: String,
}

/// A conversation between one end user and a tenant's operators/bot.
///
/// Created on the first inbound platform message, never deleted by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: TenantId,
    pub end_user: EndUser,
    /// Escalation flag: the conversation needs priority human attention.
    pub human_required: bool,
    /// Whether the bot answers user messages automatically.
    pub automation_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Name shown in conversation lists.
    pub fn display_name(&self) -> String {
        let user = &self.end_user;
        [&user.nickname, &user.name, &user.username]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("User {}", self.id))
    }

    pub fn status(&self) -> ConversationStatus {
        if self.human_required {
            ConversationStatus::HumanRequired
        } else if self.automation_enabled {
            ConversationStatus::Online
        } else {
            ConversationStatus::Offline
        }
    }
}

/// Derived presentation status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    HumanRequired,
    Online,
    Offline,
}

/// A conversation enriched with unread state, as listed by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub display_name: String,
    pub unread_count: u32,
    pub last_message_time: Option<DateTime<Utc>>,
    pub status: ConversationStatus,
}

/// Body of the directory listing: sorted conversations plus the ordering used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub users: Vec<ConversationSummary>,
    pub sorting: String,
}

/// A normalized inbound platform message, before its conversation exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: TenantId,
    /// Free-form platform label, normalized with [`Platform::normalize`].
    pub platform: String,
    pub external_id: String,
    pub chat_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub text: String,
}
