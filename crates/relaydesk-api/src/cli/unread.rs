//! `rdesk unread`: unread state of conversations from the local stores.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};

use relaydesk_types::conversation::ConversationId;

use crate::state::AppState;

pub async fn show_unread(state: &AppState, ids: &[ConversationId], json: bool) -> Result<()> {
    let states = state.unread.get_all_states(ids).await?;

    if json {
        let ordered: std::collections::BTreeMap<_, _> = states.iter().collect();
        println!("{}", serde_json::to_string_pretty(&ordered)?);
    } else {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Conversation").fg(Color::White),
            Cell::new("Unread").fg(Color::White),
            Cell::new("Last Message").fg(Color::White),
            Cell::new("Last Response").fg(Color::White),
        ]);

        let fmt = |at: Option<chrono::DateTime<chrono::Utc>>| {
            at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        for id in ids {
            let unread = states.get(id).copied().unwrap_or_default();
            table.add_row(vec![
                Cell::new(id),
                Cell::new(unread.count).fg(if unread.count > 0 { Color::Cyan } else { Color::DarkGrey }),
                Cell::new(fmt(unread.last_message_at)),
                Cell::new(fmt(unread.last_response_at)).fg(Color::DarkGrey),
            ]);
        }
        println!();
        println!("{table}");
        println!();
    }

    Ok(())
}
