//! Review router CLI entry point.

use clap::Parser;
use pr_review_router::cli::{Cli, Commands, ConfigCommand};
use pr_review_router::commands::{config_init, review, validate};
use pr_review_router::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    let config_path = cli.config.to_string_lossy().to_string();
    let config = Config::from_file(&cli.config).unwrap_or_else(|e| {
        tracing::warn!(
            "no usable configuration at {}, using defaults ({e})",
            cli.config.display()
        );
        Config::default()
    });

    match cli.command {
        Commands::Review(args) => review::run(args, &config, &config_path).await?,
        Commands::Validate(args) => validate::run(args, &config, &config_path).await?,
        Commands::ConfigCmd(ConfigCommand::Init(args)) => config_init::run(args).await?,
    }

    Ok(())
}
