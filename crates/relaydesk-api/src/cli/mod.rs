//! CLI command definitions for the `rdesk` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod bot;
pub mod inbox;
pub mod serve;
pub mod unread;
pub mod watch;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use relaydesk_types::auth::{AuthUser, Role};
use relaydesk_types::conversation::{ConversationId, TenantId};

/// Real-time chat relay for operator consoles.
#[derive(Parser)]
#[command(name = "rdesk", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log as JSON lines.
    #[arg(long, global = true, env = "RELAYDESK_LOG_JSON")]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "RELAYDESK_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server (socket, streams and REST API).
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000", env = "RELAYDESK_PORT")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1", env = "RELAYDESK_HOST")]
        host: String,
    },

    /// List conversations in display order with unread counts.
    Inbox {
        /// Tenant id, or "all".
        #[arg(default_value = "all")]
        tenant: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Show unread state for conversations.
    Unread {
        /// Conversation ids.
        #[arg(required = true)]
        ids: Vec<ConversationId>,
    },

    /// Follow a conversation's event stream on a running server.
    Watch {
        /// Conversation id.
        conversation: ConversationId,

        /// Base URL of the relay server.
        #[arg(long, default_value = "http://127.0.0.1:3000", env = "RELAYDESK_URL")]
        url: String,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Manage platform bot credentials.
    Bot {
        #[command(subcommand)]
        action: bot::BotCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Operator identity for commands that act on behalf of an operator.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// Operator id.
    #[arg(long = "as", default_value = "cli", env = "RELAYDESK_USER_ID")]
    pub user_id: String,

    /// Operator role: platform_admin, tenant_owner or tenant_manager.
    #[arg(long, default_value = "platform_admin", env = "RELAYDESK_USER_ROLE")]
    pub role: String,

    /// Tenant id (required for tenant_manager).
    #[arg(long, env = "RELAYDESK_CLIENT_ID")]
    pub client: Option<String>,
}

impl IdentityArgs {
    pub fn to_user(&self) -> anyhow::Result<AuthUser> {
        let role: Role = self.role.parse()?;
        Ok(AuthUser {
            id: self.user_id.clone(),
            role,
            tenant_id: self.client.clone().map(TenantId::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_inbox_identity() {
        let cli = Cli::try_parse_from([
            "rdesk", "inbox", "acme", "--as", "op-1", "--role", "tenant_manager", "--client", "acme",
        ])
        .unwrap();
        let Commands::Inbox { tenant, identity } = cli.command else {
            panic!("expected inbox");
        };
        assert_eq!(tenant, "acme");
        let user = identity.to_user().unwrap();
        assert_eq!(user.role, Role::TenantManager);
        assert_eq!(user.tenant_id, Some(TenantId::new("acme")));
    }

    #[test]
    fn rejects_unknown_role() {
        let identity = IdentityArgs {
            user_id: "x".into(),
            role: "root".into(),
            client: None,
        };
        assert!(identity.to_user().is_err());
    }
}
