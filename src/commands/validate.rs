//! `validate` command: resolve the diff and run preflight checks without
//! invoking any agent, so CI can gate on configuration correctness alone.

use crate::cli::ValidateArgs;
use crate::config::Config;
use crate::diff::store::DiffStore;
use crate::preflight::run_preflight;
use anyhow::{anyhow, Result};
use tracing::{info, warn};

pub async fn run(args: ValidateArgs, config: &Config, config_path: &str) -> Result<()> {
    let store = DiffStore::new(&args.repo);
    let change_set = store.get_diff(&config.git.default_base_ref, "HEAD")?;
    info!(
        files = change_set.files.len(),
        additions = change_set.total_additions,
        deletions = change_set.total_deletions,
        "resolved change set"
    );

    let report = run_preflight(config, config_path);
    for warning in &report.warnings {
        warn!(%warning, "preflight warning");
    }
    if !report.valid {
        for error in &report.errors {
            tracing::error!(%error, "preflight error");
        }
        return Err(anyhow!("preflight failed with {} error(s)", report.errors.len()));
    }

    info!("configuration and preflight checks passed");
    Ok(())
}
