use anyhow::{Context, Result};
use clap::Parser;
use runner_gateway::config::Settings;
use runner_gateway::infrastructure::{init_tracing, log_messages};
use runner_gateway::Application;
use std::path::PathBuf;
use tracing::info;

/// Authenticating reverse proxy for runner backends
#[derive(Parser, Debug)]
#[command(name = "runner_gateway", version, about)]
struct Cli {
    /// Settings file; defaults to the layered `config/` directory
    #[arg(short, long, env = "RUNNER_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::new().context("failed to load settings")?,
    };

    init_tracing(&settings.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "{}", log_messages::application::STARTING);

    Application::new(settings)?.run().await?;

    Ok(())
}
