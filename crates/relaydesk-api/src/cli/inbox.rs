//! `rdesk inbox`: the conversation list as an operator sees it.
//!
//! Uses the HTTP directory when a directory URL is configured and falls back
//! to the local stores when it is unreachable.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use relaydesk_core::directory::{ConversationDirectory, FallbackDirectory};
use relaydesk_infra::config::resolve_directory_url;
use relaydesk_infra::directory::HttpDirectory;
use relaydesk_types::conversation::{ConversationStatus, ConversationSummary, DirectoryListing};

use super::IdentityArgs;
use crate::state::AppState;

pub async fn list_inbox(state: &AppState, tenant: &str, identity: &IdentityArgs, json: bool) -> Result<()> {
    let user = identity.to_user()?;

    let directory_url = resolve_directory_url(&state.config, std::env::var("RELAYDESK_DIRECTORY_URL").ok());
    let listing = match directory_url {
        Some(url) => {
            tracing::debug!(url, "listing through http directory");
            FallbackDirectory::new(HttpDirectory::new(url), state.directory.clone())
                .list(&user, tenant)
                .await?
        }
        None => state.directory.list(&user, tenant).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    render(&listing);
    Ok(())
}

fn status_cell(summary: &ConversationSummary) -> Cell {
    match summary.status {
        ConversationStatus::HumanRequired => Cell::new("▲ human").fg(Color::Red),
        ConversationStatus::Online => Cell::new("● bot").fg(Color::Green),
        ConversationStatus::Offline => Cell::new("○ manual").fg(Color::Yellow),
    }
}

fn render(listing: &DirectoryListing) {
    if listing.users.is_empty() {
        println!();
        println!("  {} No conversations yet.", style("i").blue().bold());
        println!();
        return;
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Tenant").fg(Color::White),
        Cell::new("Platform").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Unread").fg(Color::White),
        Cell::new("Last Message").fg(Color::White),
    ]);

    for summary in &listing.users {
        let conversation = &summary.conversation;
        let unread = if summary.unread_count > 0 {
            Cell::new(summary.unread_count).fg(Color::Cyan)
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };
        let last = summary
            .last_message_time
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        table.add_row(vec![
            Cell::new(conversation.id),
            Cell::new(&summary.display_name).fg(Color::Cyan),
            Cell::new(&conversation.tenant_id),
            Cell::new(conversation.end_user.platform),
            status_cell(summary),
            unread,
            Cell::new(last).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!("  {}", style(format!("sorted by {}", listing.sorting)).dim());
    println!();
}
