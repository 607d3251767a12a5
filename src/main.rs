//! SavvyBot binary entry point.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Cli::parse();
    match args.command.unwrap_or(cli::Commands::Run) {
        cli::Commands::Run => cli::cmd_run().await,
        cli::Commands::Quota { user, json } => cli::cmd_quota(user, json).await,
    }
}
