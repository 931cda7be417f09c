use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "review-router",
    version,
    about = "Multi-agent pull-request review orchestrator",
    long_about = "Ingests a git diff, runs the in-process control-flow analyzer plus any\n\
                  configured external agents, and posts reviewer-quality findings to\n\
                  GitHub or Azure DevOps with stable, re-identifiable fingerprints."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, default_value = "router.toml", global = true)]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run preflight + analysis + reporting for a base..head range
    Review(ReviewArgs),

    /// Validate configuration and preflight checks without running agents
    Validate(ValidateArgs),

    /// Manage configuration
    #[command(name = "config", subcommand)]
    ConfigCmd(ConfigCommand),
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a default configuration file
    Init(ConfigInitArgs),
}

#[derive(clap::Args)]
pub struct ReviewArgs {
    /// Repository path
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// `base..head` or `base...head` range spec
    #[arg(long)]
    pub range: Option<String>,

    /// Review staged changes instead of a range
    #[arg(long, conflicts_with = "range")]
    pub staged: bool,

    /// Review the uncommitted working tree instead of a range
    #[arg(long, conflicts_with_all = ["range", "staged"])]
    pub working_tree: bool,

    /// Pull-request identifier (used in the cache key and reporter)
    #[arg(long, default_value = "local")]
    pub pr: String,

    /// This run is a direct push to the main branch, not a PR
    #[arg(long)]
    pub main_branch_push: bool,

    /// Only validate additions-only lines when resolving inline comments
    #[arg(long)]
    pub additions_only: bool,

    /// Print findings instead of publishing to a configured reporter
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigInitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,

    /// Template to seed the configuration from
    #[arg(long)]
    pub template: Option<String>,

    /// Output path
    #[arg(long, default_value = "router.toml")]
    pub output: PathBuf,
}
