//! `rdesk watch`: follow a conversation's one-way stream on a running server.
//!
//! Prints application frames as they arrive. Heartbeat frames keep the
//! connection alive and are never printed.

use anyhow::{bail, Context, Result};
use console::style;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;

use relaydesk_types::conversation::ConversationId;
use relaydesk_types::event::{parse_stream_frame, ServerEvent};

use super::IdentityArgs;

pub async fn watch(base_url: &str, conversation: ConversationId, identity: &IdentityArgs, json: bool) -> Result<()> {
    let user = identity.to_user()?;
    let url = format!(
        "{}/api/v1/conversations/{conversation}/stream",
        base_url.trim_end_matches('/')
    );

    let mut request = reqwest::Client::new()
        .get(&url)
        .header("X-User-Id", &user.id)
        .header("X-User-Role", user.role.to_string());
    if let Some(tenant) = &user.tenant_id {
        request = request.header("X-Client-Id", tenant.as_str());
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("failed to connect to {base_url}"))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("stream request failed: HTTP {status}: {body}");
    }

    if !json {
        println!(
            "  {} watching conversation {} (Ctrl+C to stop)",
            style("👁").bold(),
            style(conversation).cyan()
        );
    }

    let mut events = response.bytes_stream().eventsource();
    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = events.next() => next,
        };
        let Some(event) = next else {
            if !json {
                println!("  {}", style("stream ended").dim());
            }
            break;
        };
        let event = event.map_err(|e| anyhow::anyhow!("stream read failed: {e}"))?;

        match parse_stream_frame(&event.data) {
            Ok(Some(frame)) if json => println!("{}", serde_json::to_string(&frame)?),
            Ok(Some(frame)) => println!("  {}", describe(&frame)),
            Ok(None) => tracing::trace!("heartbeat"),
            Err(e) => tracing::warn!(error = %e, raw = %event.data, "ignoring malformed frame"),
        }
    }
    Ok(())
}

fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::NewMessage(message) => format!(
            "{} {} {}",
            style(message.created_at.format("%H:%M:%S")).dim(),
            style(format!("[{}]", message.sender)).cyan(),
            message.body
        ),
        ServerEvent::UserJoined { user_id, .. } => format!("{} joined", style(user_id).green()),
        ServerEvent::UserLeft { user_id } => format!("{} left", style(user_id).yellow()),
        ServerEvent::UserTyping { user_id, is_typing } => {
            let verb = if *is_typing { "is typing..." } else { "stopped typing" };
            format!("{} {}", style(user_id).dim(), style(verb).dim())
        }
        ServerEvent::MessageError { error } => format!("{} {error}", style("error:").red()),
        ServerEvent::UnreadChanged(update) => format!(
            "conversation {} unread {}",
            update.conversation_id, update.count
        ),
        ServerEvent::Heartbeat => "heartbeat".to_string(),
    }
}
