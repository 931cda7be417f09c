//! `config init` command: writes a starter configuration file.

use crate::cli::ConfigInitArgs;
use crate::config::Config;
use anyhow::{anyhow, Result};
use tokio::fs;

pub async fn run(args: ConfigInitArgs) -> Result<()> {
    if fs::metadata(&args.output).await.is_ok() && !args.force {
        return Err(anyhow!(
            "{} already exists; pass --force to overwrite",
            args.output.display()
        ));
    }

    let config = match args.template.as_deref() {
        None | Some("default") => Config::default(),
        Some("ci") => template_ci(),
        Some("github") => template_github(),
        Some("ado") => template_ado(),
        Some(other) => {
            return Err(anyhow!(
                "unknown template '{other}'; available templates: default, ci, github, ado"
            ))
        }
    };

    let toml_content = toml::to_string_pretty(&config)?;
    fs::write(&args.output, toml_content).await?;

    tracing::info!("wrote configuration to {}", args.output.display());
    tracing::info!("next steps:");
    tracing::info!("  1. review and customize {}", args.output.display());
    tracing::info!("  2. run: review-router validate");
    tracing::info!("  3. run: review-router review --range <base>..<head>");

    Ok(())
}

fn template_ci() -> Config {
    let mut config = Config::default();
    config.preflight.dual_platform = true;
    config.preflight.require_ci_marker = true;
    config
}

fn template_github() -> Config {
    let mut config = Config::default();
    config.reporter.github.enabled = true;
    config.reporter.github.repository = "owner/repo".to_string();
    config
}

fn template_ado() -> Config {
    let mut config = Config::default();
    config.reporter.ado.enabled = true;
    config.reporter.ado.organization = "my-org".to_string();
    config.reporter.ado.project = "my-project".to_string();
    config.reporter.ado.repository = "my-repo".to_string();
    config
}
