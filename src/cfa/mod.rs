//! Mitigation-aware static analysis core: the only in-process
//! agent. Parses each changed file, builds per-function control-flow
//! graphs, matches mitigation patterns, performs bounded path-coverage
//! analysis, and emits severity-adjusted, fingerprinted findings.

pub mod analyzer;
pub mod async_refine;
pub mod builder;
pub mod cfg;
pub mod interprocedural;
pub mod mitigation;
pub mod parser;
pub mod path_analysis;
pub mod pattern_timeout;
pub mod severity;

pub use analyzer::run_cfa;
