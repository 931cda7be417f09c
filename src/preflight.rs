//! `Preflight`: validates configuration, secrets, and
//! provider/model compatibility before any agent runs. Checks accumulate —
//! an earlier failure never short-circuits a later check.

use crate::config::Config;
use crate::types::stable_fingerprint;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ResolvedPreflight {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub config_path: String,
    pub effective_environment_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub resolved: Option<ResolvedPreflight>,
}

const CLOUD_KEY_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("azure", "AZURE_OPENAI_API_KEY"),
];

pub fn run_preflight(config: &Config, config_path: &str) -> PreflightReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let cloud_llm_agents: Vec<_> = config
        .passes
        .passes
        .iter()
        .flat_map(|p| p.agents.iter())
        .filter(|a| a.kind == "cloud_llm")
        .collect();
    let has_required_cloud_agent = cloud_llm_agents.iter().any(|a| a.required);

    // 1. Required secrets per enabled agent.
    for agent in &cloud_llm_agents {
        let provider = agent.provider.as_deref().unwrap_or("");
        let has_key = CLOUD_KEY_VARS
            .iter()
            .any(|(p, var)| *p == provider && std::env::var(var).is_ok());
        if !has_key {
            errors.push(format!(
                "agent '{}' requires credentials for provider '{provider}' but none were found",
                agent.id
            ));
        }
    }

    // 2. Model configuration present, or auto-applyable for single-key setups.
    let present_keys: Vec<&str> = CLOUD_KEY_VARS
        .iter()
        .filter(|(_, var)| std::env::var(var).is_ok())
        .map(|(p, _)| *p)
        .collect();
    for agent in &cloud_llm_agents {
        if agent.model.is_none() && present_keys.len() != 1 {
            errors.push(format!(
                "agent '{}' has no model configured and the active key set is ambiguous",
                agent.id
            ));
        }
    }

    // 3/4. Provider-model match and family compatibility.
    for agent in &cloud_llm_agents {
        if let (Some(provider), Some(model)) = (&agent.provider, &agent.model) {
            if !model_matches_provider(provider, model) {
                errors.push(format!(
                    "agent '{}' model '{model}' is not compatible with provider '{provider}'",
                    agent.id
                ));
            }
        }
    }

    // 5. Infra-specific validations.
    for agent in &cloud_llm_agents {
        if agent.provider.as_deref() == Some("azure")
            && std::env::var("AZURE_OPENAI_DEPLOYMENT_NAME").is_err()
        {
            errors.push(format!(
                "agent '{}' targets azure but AZURE_OPENAI_DEPLOYMENT_NAME is unset",
                agent.id
            ));
        }
        if agent.kind == "local_llm" && std::env::var("LOCAL_LLM_BASE_URL").is_err() {
            errors.push(format!(
                "agent '{}' is a local_llm agent but LOCAL_LLM_BASE_URL is unset",
                agent.id
            ));
        }
    }

    // 6. Chat-capability check.
    for agent in &cloud_llm_agents {
        if let Some(model) = &agent.model {
            if model.contains("-instruct") || model.contains("-completion") {
                errors.push(format!(
                    "agent '{}' model '{model}' is completion-only and cannot serve a chat agent",
                    agent.id
                ));
            }
        }
    }

    // 7. Multi-key ambiguity.
    let distinct_providers: HashSet<&str> = present_keys.iter().copied().collect();
    if distinct_providers.len() > 1 {
        let any_explicit_provider = cloud_llm_agents.iter().all(|a| a.provider.is_some());
        if !any_explicit_provider {
            errors.push(
                "multiple provider credentials are present; every cloud agent must set an explicit provider"
                    .to_string(),
            );
        }
    }

    // 8. Platform-environment consistency.
    if config.preflight.dual_platform && config.preflight.require_ci_marker {
        let ci_marker_present = std::env::var("CI").is_ok() || std::env::var("GITHUB_ACTIONS").is_ok();
        if !ci_marker_present {
            warnings.push("dual-platform reporting is configured but no CI marker was found in the environment".to_string());
        }
    }

    // Demotion: when no required cloud agent is enabled, cloud-specific
    // errors become warnings; infra/ambiguity errors remain fatal.
    let (fatal, demoted): (Vec<String>, Vec<String>) = if has_required_cloud_agent {
        (errors, Vec::new())
    } else {
        errors.into_iter().partition(|e| {
            e.contains("AZURE_OPENAI_DEPLOYMENT_NAME")
                || e.contains("LOCAL_LLM_BASE_URL")
                || e.contains("must set an explicit provider")
        })
    };
    warnings.extend(demoted);

    let provider = cloud_llm_agents
        .first()
        .and_then(|a| a.provider.clone());
    let model = cloud_llm_agents.first().and_then(|a| a.model.clone());
    let effective_environment_hash = stable_fingerprint(&[
        provider.as_deref().unwrap_or(""),
        model.as_deref().unwrap_or(""),
        config_path,
    ]);

    let resolved = ResolvedPreflight {
        provider,
        model,
        config_path: config_path.to_string(),
        effective_environment_hash,
    };

    info!(
        provider = ?resolved.provider,
        model = ?resolved.model,
        config_path = %resolved.config_path,
        env_hash = %resolved.effective_environment_hash,
        "preflight resolved"
    );

    PreflightReport {
        valid: fatal.is_empty(),
        errors: fatal,
        warnings,
        resolved: Some(resolved),
    }
}

fn model_matches_provider(provider: &str, model: &str) -> bool {
    match provider {
        "openai" => model.starts_with("gpt-") || model.starts_with("o1"),
        "anthropic" => model.starts_with("claude-"),
        "azure" => true,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, PassConfig};

    fn agent(kind: &str, provider: Option<&str>, model: Option<&str>, required: bool) -> AgentConfig {
        AgentConfig {
            id: "test-agent".into(),
            kind: kind.into(),
            provider: provider.map(|s| s.to_string()),
            model: model.map(|s| s.to_string()),
            required,
        }
    }

    #[test]
    fn no_cloud_agents_is_clean() {
        let config = Config::default();
        let report = run_preflight(&config, "router.toml");
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_credentials_is_error_when_required() {
        let mut config = Config::default();
        config.passes.passes.push(PassConfig {
            name: "pass1".into(),
            enabled: true,
            required: true,
            agents: vec![agent("cloud_llm", Some("openai"), Some("gpt-4o"), true)],
        });
        let report = run_preflight(&config, "router.toml");
        assert!(!report.valid);
        assert!(!report.errors.is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn missing_credentials_demoted_when_agent_optional() {
        let mut config = Config::default();
        config.passes.passes.push(PassConfig {
            name: "pass1".into(),
            enabled: true,
            required: false,
            agents: vec![agent("cloud_llm", Some("openai"), Some("gpt-4o"), false)],
        });
        let report = run_preflight(&config, "router.toml");
        assert!(report.valid);
    }

    #[test]
    #[serial_test::serial]
    fn completion_only_model_is_rejected_for_chat_agent() {
        std::env::set_var("OPENAI_API_KEY", "sk-test");
        let mut config = Config::default();
        config.passes.passes.push(PassConfig {
            name: "pass1".into(),
            enabled: true,
            required: true,
            agents: vec![agent("cloud_llm", Some("openai"), Some("gpt-3.5-turbo-instruct"), true)],
        });
        let report = run_preflight(&config, "router.toml");
        assert!(!report.valid);
        std::env::remove_var("OPENAI_API_KEY");
    }
}
