//! PPA CLI - command-line interface for PPA amplifiers.
//!
//! Discovers devices by broadcast, pings them, recalls presets, sets the
//! master volume and can run a simulated device for testing.

mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::Session;
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancelled on the first Ctrl+C.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, shutting down");
            token.cancel();
        }
    });
    cancel
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let session = Session {
        cancel: shutdown_token(),
        port: cli.port,
        component_id: cli.component_id,
        json: cli.json,
    };

    match cli.command {
        Commands::Discover(args) => commands::run_discover(args, &session).await,
        Commands::Ping(args) => commands::run_ping(args, &session).await,
        Commands::Recall(args) => commands::run_recall(args, &session).await,
        Commands::Volume(args) => commands::run_volume(args, &session).await,
        Commands::Simulate(args) => commands::run_simulate(args, &session).await,
    }
}
