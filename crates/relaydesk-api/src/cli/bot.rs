//! `rdesk bot`: manage a tenant's platform bot credentials.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use secrecy::SecretString;
use uuid::Uuid;

use relaydesk_core::repository::platform_bot::{PlatformBot, PlatformBotRepository};
use relaydesk_types::conversation::{Platform, TenantId};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum BotCommand {
    /// Register a bot token and make it the tenant's active bot on the platform.
    Set {
        /// Tenant id.
        tenant: String,

        /// Platform: telegram, whatsapp or instagram.
        platform: Platform,

        /// Bot token (Telegram bot token or Graph API access token).
        #[arg(long, env = "RELAYDESK_BOT_TOKEN", hide_env_values = true)]
        token: String,

        /// Display name.
        #[arg(long, default_value = "default")]
        name: String,

        /// Store the bot without activating it.
        #[arg(long)]
        inactive: bool,
    },

    /// List a tenant's bots.
    #[command(alias = "ls")]
    List {
        /// Tenant id.
        tenant: String,
    },
}

pub async fn run(state: &AppState, command: BotCommand, json: bool) -> Result<()> {
    match command {
        BotCommand::Set {
            tenant,
            platform,
            token,
            name,
            inactive,
        } => set_bot(state, &tenant, platform, token, name, !inactive, json).await,
        BotCommand::List { tenant } => list_bots(state, &tenant, json).await,
    }
}

async fn set_bot(
    state: &AppState,
    tenant: &str,
    platform: Platform,
    token: String,
    name: String,
    active: bool,
    json: bool,
) -> Result<()> {
    let token = token.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("bot token must not be empty");
    }

    let bot = PlatformBot {
        id: Uuid::now_v7(),
        tenant_id: TenantId::new(tenant),
        platform,
        name,
        token: SecretString::from(token),
        is_active: active,
        created_at: chrono::Utc::now(),
    };
    state.bots.save(&bot).await.context("failed to save bot")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": bot.id,
                "tenant_id": bot.tenant_id,
                "platform": bot.platform,
                "name": bot.name,
                "is_active": bot.is_active,
            }))?
        );
    } else {
        println!();
        println!(
            "  {} Saved {} bot '{}' for tenant {}{}",
            style("✓").green().bold(),
            style(platform).cyan(),
            bot.name,
            style(tenant).cyan(),
            if active { "" } else { " (inactive)" }
        );
        println!();
    }
    Ok(())
}

async fn list_bots(state: &AppState, tenant: &str, json: bool) -> Result<()> {
    let bots = state.bots.list(&TenantId::new(tenant)).await?;

    if json {
        let rows: Vec<_> = bots
            .iter()
            .map(|bot| {
                serde_json::json!({
                    "id": bot.id,
                    "platform": bot.platform,
                    "name": bot.name,
                    "is_active": bot.is_active,
                    "created_at": bot.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if bots.is_empty() {
        println!();
        println!(
            "  {} No bots for {}. Add one with: {}",
            style("i").blue().bold(),
            style(tenant).cyan(),
            style("rdesk bot set <tenant> <platform> --token ...").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Platform").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);
    for bot in &bots {
        let status = if bot.is_active {
            Cell::new("● active").fg(Color::Green)
        } else {
            Cell::new("○ inactive").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(bot.platform).fg(Color::Cyan),
            Cell::new(&bot.name),
            status,
            Cell::new(bot.created_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
