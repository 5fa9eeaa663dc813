use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use habit_tracker_client::config::Config;
use habit_tracker_client::navigation::LogNavigator;
use habit_tracker_client::SessionManager;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists, before clap reads env fallbacks
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();

    // Load configuration first (for log level)
    let config = Config::load(cli.args)?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(api_url = %config.api_url, "Configuration loaded");

    let session = Arc::new(SessionManager::from_config(&config, Arc::new(LogNavigator))?);

    cli::run(cli.command, session, &config).await
}
