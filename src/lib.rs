//! # Review Router
//!
//! A multi-agent pull-request review orchestrator: ingests a git diff,
//! runs the in-process control-flow analyzer plus any configured external
//! agents behind a shared budget and cache, resolves findings against
//! diff-addressable lines, and posts reviewer-quality findings to GitHub
//! or Azure DevOps.

pub mod agent;
pub mod budget;
pub mod cache;
pub mod cfa;
pub mod cli;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod ignore;
pub mod line_resolver;
pub mod pipeline;
pub mod preflight;
pub mod reporter;
pub mod runner;
pub mod security_log;
pub mod types;
pub mod utils;

pub use crate::config::Config;
pub use crate::error::RouterError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
