//! `rdesk serve`: run the relay server until Ctrl+C / SIGTERM.

use anyhow::{Context, Result};
use console::style;
use crate::http;
use crate::state::{AppState, ConcreteUnreadEngine};

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    match state.unread.warm_from_snapshots().await {
        Ok(warmed) => tracing::info!(warmed, "unread cache warmed from snapshots"),
        Err(e) => tracing::warn!(error = %e, "failed to warm unread cache"),
    }
    let feed = state.unread.spawn_change_feed(state.shutdown.clone());
    log_unread_changes(&state.unread);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!(
        "  {} relaydesk listening on {}",
        style("⚡").bold(),
        style(format!("http://{addr}")).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let shutdown = state.shutdown.clone();
    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    if let Err(e) = feed.await {
        tracing::warn!(error = %e, "change feed task ended abnormally");
    }
    println!("\n  Server stopped.");
    Ok(())
}

fn log_unread_changes(engine: &ConcreteUnreadEngine) {
    engine.subscribe(|update| {
        tracing::debug!(
            conversation_id = %update.conversation_id,
            count = update.count,
            "unread changed"
        );
    });
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
