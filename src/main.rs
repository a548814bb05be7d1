mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::AnyError;
use fragstore::config::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let cancel = CancellationToken::new();
    tokio::spawn(commands::shutdown_signal(cancel.clone()));

    match cli.command {
        Commands::Upload(args) => commands::upload(&config, args, cancel).await?,
        Commands::Poll(args) => commands::poll(&config, args, cancel).await?,
        Commands::DecodeBatch(args) => commands::decode_batch(args).await?,
    }

    Ok(())
}
