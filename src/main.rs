use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod command;
mod config;
mod guard;
mod license;
mod state;

use cli::{Cli, Commands};
use config::EnvSnapshot;
use state::StateDir;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine: the environment may be set by the supervisor.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let env = EnvSnapshot::from_process();

    // Initialize logging
    let default_level = if cli.verbose || config::is_dev(&env) {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }

    let state_dir = StateDir::new(&cli.state_dir);

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => command::run_check(env, state_dir).await?,
        Commands::LicenseKey => command::run_license_key(env, state_dir).await?,
        Commands::Status => command::run_status(state_dir)?,
    }

    Ok(())
}
