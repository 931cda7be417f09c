//! Root configuration: a `Config` composed of nested per-concern structs,
//! loaded from TOML with `${VAR}` environment-variable substitution.

use crate::error::{Result, RouterError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub passes: PassesConfig,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let processed = Self::process_env_vars(&content);
        let config: Config = toml::from_str(&processed)?;
        config.validate()?;
        Ok(config)
    }

    /// Substitutes `${VAR}` occurrences from the process environment;
    /// unset variables are left as literal placeholders.
    pub fn process_env_vars(content: &str) -> String {
        let mut result = content.to_string();
        for capture in ENV_VAR_PATTERN.captures_iter(content) {
            let placeholder = &capture[0];
            let var_name = &capture[1];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }
        result
    }

    pub fn validate(&self) -> Result<()> {
        if self.reporter.github.enabled && self.reporter.github.repository.is_empty() {
            return Err(RouterError::config(
                "reporter.github is enabled but reporter.github.repository is not set",
            ));
        }
        if self.reporter.ado.enabled && self.reporter.ado.organization.is_empty() {
            return Err(RouterError::config(
                "reporter.ado is enabled but reporter.ado.organization is not set",
            ));
        }
        if self.reporter.ado.enabled && self.reporter.ado.repository.is_empty() {
            return Err(RouterError::config(
                "reporter.ado is enabled but reporter.ado.repository is not set",
            ));
        }
        for pass in &self.passes.passes {
            if pass.agents.is_empty() {
                return Err(RouterError::config(format!(
                    "pass '{}' declares no agents",
                    pass.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub repo_path: String,
    pub default_base_ref: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            repo_path: ".".to_string(),
            default_base_ref: "main".to_string(),
        }
    }
}

/// A single custom mitigation-pattern definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub exact_names: Vec<String>,
    #[serde(default)]
    pub name_regex: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    /// Vulnerability kinds (by `VulnerabilityKind::kind_str`) this pattern
    /// mitigates. Unrecognized kind strings are ignored.
    #[serde(default)]
    pub mitigates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PatternsConfig {
    pub custom: Vec<PatternDefinition>,
    /// ReDoS risk score (0-100) at or above which a pattern is rejected.
    pub redos_rejection_threshold: Option<u8>,
    pub whitelist: Vec<String>,
    pub pattern_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_files: usize,
    pub max_changed_lines: u64,
    pub max_tokens: u64,
    pub max_usd: f64,
    pub max_wall_ms: u64,
    pub max_call_depth: u32,
    pub max_nodes_visited: u64,
    pub max_pattern_regex_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let defaults = crate::budget::BudgetLimits::default();
        Self {
            max_files: defaults.max_files,
            max_changed_lines: defaults.max_changed_lines,
            max_tokens: defaults.max_tokens,
            max_usd: defaults.max_usd,
            max_wall_ms: defaults.max_wall_ms,
            max_call_depth: defaults.max_call_depth,
            max_nodes_visited: defaults.max_nodes_visited,
            max_pattern_regex_ms: defaults.max_pattern_regex_ms,
        }
    }
}

impl From<&BudgetConfig> for crate::budget::BudgetLimits {
    fn from(c: &BudgetConfig) -> Self {
        Self {
            max_files: c.max_files,
            max_changed_lines: c.max_changed_lines,
            max_tokens: c.max_tokens,
            max_usd: c.max_usd,
            max_wall_ms: c.max_wall_ms,
            max_call_depth: c.max_call_depth,
            max_nodes_visited: c.max_nodes_visited,
            max_pattern_regex_ms: c.max_pattern_regex_ms,
            warn_at_percentages: vec![75, 90],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PreflightConfig {
    pub dual_platform: bool,
    pub require_ci_marker: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PassConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub required: bool,
    pub agents: Vec<AgentConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PassesConfig {
    pub passes: Vec<PassConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GithubReporterConfig {
    pub enabled: bool,
    pub repository: String,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdoReporterConfig {
    pub enabled: bool,
    pub organization: String,
    pub project: String,
    pub repository: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReporterConfig {
    pub github: GithubReporterConfig,
    pub ado: AdoReporterConfig,
    pub line_proximity_threshold: Option<u32>,
    /// Caps the number of inline comment groups posted in one run; excess
    /// groups are dropped (highest severity first) and the drop count is
    /// logged. `None` means unbounded.
    pub max_inline_comments: Option<u32>,
    /// The minimum severity that gates the overall status. `None` defaults
    /// to `Severity::Warning` (fail on warning or error; info never gates).
    pub fail_on_severity: Option<crate::types::Severity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IgnoreConfig {
    pub ignore_file: Option<String>,
    pub exclude: Vec<String>,
    pub include: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_substitution_leaves_unset_vars_literal() {
        std::env::set_var("ROUTER_TEST_TOKEN", "abc123");
        let input = "token = \"${ROUTER_TEST_TOKEN}\"\nother = \"${ROUTER_TEST_UNSET}\"";
        let out = Config::process_env_vars(input);
        assert!(out.contains("abc123"));
        assert!(out.contains("${ROUTER_TEST_UNSET}"));
        std::env::remove_var("ROUTER_TEST_TOKEN");
    }

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn github_enabled_without_repo_fails_validation() {
        let mut config = Config::default();
        config.reporter.github.enabled = true;
        assert!(config.validate().is_err());
    }
}
