//! Archive manager CLI entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose() { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cancel = CancellationToken::new();
    let signals = obsarchive_worker::signal::spawn_signal_listener(cancel.clone());

    let result = cli.execute(cancel).await;
    signals.abort();

    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {
            tracing::warn!("Stopped by interrupt: {}", e.message);
        }
        Err(e) => {
            output::print_error(&e.to_string());
            std::process::exit(1);
        }
    }
}
