//! relaydesk CLI and server entry point.
//!
//! Binary name: `rdesk`
//!
//! Parses CLI arguments, initializes tracing, the database and services,
//! then dispatches to the command handler or starts the server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use relaydesk_observe::{init_tracing, shutdown_tracing, TracingOptions};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        verbosity: cli.verbose,
        json: cli.log_json,
        otel: cli.otel,
        quiet: cli.quiet,
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions and the stream watcher don't need app state
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(*shell, &mut cmd, "rdesk", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Watch {
            conversation,
            url,
            identity,
        } => {
            let result = cli::watch::watch(url, *conversation, identity, cli.json).await;
            shutdown_tracing();
            return result;
        }
        _ => {}
    }

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Serve { port, host } => cli::serve::serve(state, &host, port).await,
        Commands::Inbox { tenant, identity } => {
            cli::inbox::list_inbox(&state, &tenant, &identity, cli.json).await
        }
        Commands::Unread { ids } => cli::unread::show_unread(&state, &ids, cli.json).await,
        Commands::Bot { action } => cli::bot::run(&state, action, cli.json).await,
        Commands::Completions { .. } | Commands::Watch { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}
