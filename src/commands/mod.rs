//! Command bodies invoked from `main.rs`. Each command takes its parsed
//! `clap::Args` plus the loaded `Config` and returns `anyhow::Result<()>` —
//! the process boundary is where `anyhow` context is layered on top of the
//! library's `RouterError`.

pub mod config_init;
pub mod review;
pub mod validate;
