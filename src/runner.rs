//! `PassRunner`: iterates configured passes and their agents,
//! consulting the result cache, applying budget and policy gates, and
//! collecting `AgentResult`s into `complete`/`partial` finding streams.

use crate::agent::{Agent, AgentContext, ResolvedProvider, ScopedEnvironment};
use crate::budget::{Budget, BudgetStatus};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::diff::ChangeSet;
use crate::error::{Result, RouterError};
use crate::types::{AgentResult, ExecutionTrace, Finding};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Run-identifying context the cache key and the main-branch policy gate
/// are derived from.
pub struct RunIdentity {
    pub pr: String,
    pub head_sha: String,
    pub config_hash: String,
    /// A direct push to the main branch (not a PR targeting it) denies
    /// in-process LLM agents.
    pub is_direct_main_branch_push: bool,
}

pub struct PassRunner {
    identity: RunIdentity,
    repo_root: PathBuf,
}

pub struct RunOutcome {
    pub trace: ExecutionTrace,
    pub complete: Vec<Finding>,
    pub partial: Vec<Finding>,
}

impl PassRunner {
    pub fn new(identity: RunIdentity, repo_root: PathBuf) -> Self {
        Self { identity, repo_root }
    }

    pub async fn run(
        &self,
        config: &Config,
        change_set: &ChangeSet,
        agents_by_id: &std::collections::HashMap<String, Box<dyn Agent>>,
        budget: &mut Budget,
        cache: &mut ResultCache,
        now_unix_ms: u64,
    ) -> Result<RunOutcome> {
        let mut trace = ExecutionTrace::default();
        let mut complete = Vec::new();
        let mut partial = Vec::new();

        for pass in &config.passes.passes {
            if !pass.enabled {
                trace.skipped_reasons.push(format!("pass '{}' disabled", pass.name));
                continue;
            }

            let pass_agents: Vec<&crate::config::AgentConfig> = pass.agents.iter().collect();
            let has_paid_llm = pass_agents.iter().any(|a| a.kind == "cloud_llm");
            if has_paid_llm && budget.status() >= BudgetStatus::Exceeded {
                let reason = format!("pass '{}' skipped: budget exhausted", pass.name);
                trace.skipped_reasons.push(reason.clone());
                if pass.required {
                    return Err(RouterError::Preflight(vec![reason]));
                }
                continue;
            }

            for agent_cfg in &pass_agents {
                let Some(agent) = agents_by_id.get(&agent_cfg.id) else {
                    warn!(agent = %agent_cfg.id, "configured agent has no registered implementation");
                    continue;
                };

                if self.identity.is_direct_main_branch_push && !agent.is_paid_llm() {
                    // in-process (non-network) LLM agents are denied on
                    // direct main-branch pushes; CFA itself never trips
                    // this because it never declares paid-LLM status and
                    // is exempt by id.
                    if agent_cfg.kind == "in_process_llm" {
                        return Err(RouterError::PolicyDenied(format!(
                            "agent '{}' is an in-process LLM agent and cannot run on a direct main-branch push",
                            agent_cfg.id
                        )));
                    }
                }

                let cache_key = ResultCache::key(
                    &self.identity.pr,
                    &self.identity.head_sha,
                    &self.identity.config_hash,
                    &agent_cfg.id,
                );

                if let Some(entry) = cache.get(&cache_key) {
                    info!(agent = %agent_cfg.id, "cache hit");
                    let result = AgentResult::Success {
                        findings: entry.findings.clone(),
                        metrics: entry.metrics.clone(),
                    };
                    trace.record(&pass.name, &agent_cfg.id, &result, true);
                    complete.extend(result.complete_findings());
                    continue;
                }

                let ctx = AgentContext {
                    change_set,
                    repo_root: self.repo_root.clone(),
                    config,
                    environment: ScopedEnvironment::allow_listed(&[
                        "OPENAI_API_KEY",
                        "ANTHROPIC_API_KEY",
                        "AZURE_OPENAI_API_KEY",
                        "AZURE_OPENAI_DEPLOYMENT_NAME",
                        "LOCAL_LLM_BASE_URL",
                    ]),
                    provider: ResolvedProvider {
                        provider: agent_cfg.provider.clone(),
                        model: agent_cfg.model.clone(),
                    },
                };

                let result = agent.run(&ctx, budget).await;
                trace.record(&pass.name, &agent_cfg.id, &result, false);

                match &result {
                    AgentResult::Success { findings, metrics } => {
                        cache.put(cache_key, findings.clone(), metrics.clone(), now_unix_ms);
                        complete.extend(result.complete_findings());
                    }
                    AgentResult::Failure { error: err, .. } => {
                        partial.extend(result.partial_findings());
                        if agent_cfg.required {
                            error!(agent = %agent_cfg.id, error = %err, "required agent failed");
                            return Err(RouterError::RequiredAgentFailed(
                                agent_cfg.id.clone(),
                                err.clone(),
                            ));
                        }
                        warn!(agent = %agent_cfg.id, error = %err, "optional agent failed, continuing");
                    }
                    AgentResult::Skipped { reason, .. } => {
                        trace.skipped_reasons.push(format!("{}: {reason}", agent_cfg.id));
                    }
                }
            }
        }

        Ok(RunOutcome {
            trace,
            complete,
            partial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentContext;
    use crate::budget::BudgetLimits;
    use crate::config::{AgentConfig, Config, PassConfig};
    use crate::diff::{ChangeSetSource, ChangeSet};
    use crate::types::AgentMetrics;
    use async_trait::async_trait;

    struct AlwaysSucceeds;
    #[async_trait]
    impl Agent for AlwaysSucceeds {
        fn id(&self) -> &str {
            "always-succeeds"
        }
        async fn run(&self, _ctx: &AgentContext<'_>, _budget: &mut Budget) -> AgentResult {
            AgentResult::Success {
                findings: vec![],
                metrics: AgentMetrics::default(),
            }
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Agent for AlwaysFails {
        fn id(&self) -> &str {
            "always-fails"
        }
        async fn run(&self, _ctx: &AgentContext<'_>, _budget: &mut Budget) -> AgentResult {
            AgentResult::Failure {
                error: "boom".into(),
                stage: "run".into(),
                partial_findings: vec![],
                metrics: AgentMetrics::default(),
            }
        }
    }

    fn empty_change_set() -> ChangeSet {
        ChangeSet {
            base_ref: "main".into(),
            head_ref: "feature".into(),
            base_sha: "a".into(),
            head_sha: "b".into(),
            check_sha: "b".into(),
            files: vec![],
            total_additions: 0,
            total_deletions: 0,
            unified_context_lines: 3,
            source: ChangeSetSource::Range,
        }
    }

    #[tokio::test]
    async fn required_agent_failure_aborts_run() {
        let mut config = Config::default();
        config.passes.passes.push(PassConfig {
            name: "pass1".into(),
            enabled: true,
            required: true,
            agents: vec![AgentConfig {
                id: "always-fails".into(),
                kind: "in_process".into(),
                provider: None,
                model: None,
                required: true,
            }],
        });

        let mut agents: std::collections::HashMap<String, Box<dyn Agent>> = std::collections::HashMap::new();
        agents.insert("always-fails".to_string(), Box::new(AlwaysFails));

        let runner = PassRunner::new(
            RunIdentity {
                pr: "1".into(),
                head_sha: "sha".into(),
                config_hash: "cfg".into(),
                is_direct_main_branch_push: false,
            },
            PathBuf::from("."),
        );
        let mut budget = Budget::new(BudgetLimits::default());
        let mut cache = ResultCache::default();
        let change_set = empty_change_set();
        let result = runner
            .run(&config, &change_set, &agents, &mut budget, &mut cache, 0)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn optional_agent_failure_continues_run() {
        let mut config = Config::default();
        config.passes.passes.push(PassConfig {
            name: "pass1".into(),
            enabled: true,
            required: false,
            agents: vec![
                AgentConfig {
                    id: "always-fails".into(),
                    kind: "in_process".into(),
                    provider: None,
                    model: None,
                    required: false,
                },
                AgentConfig {
                    id: "always-succeeds".into(),
                    kind: "in_process".into(),
                    provider: None,
                    model: None,
                    required: false,
                },
            ],
        });

        let mut agents: std::collections::HashMap<String, Box<dyn Agent>> = std::collections::HashMap::new();
        agents.insert("always-fails".to_string(), Box::new(AlwaysFails));
        agents.insert("always-succeeds".to_string(), Box::new(AlwaysSucceeds));

        let runner = PassRunner::new(
            RunIdentity {
                pr: "1".into(),
                head_sha: "sha".into(),
                config_hash: "cfg".into(),
                is_direct_main_branch_push: false,
            },
            PathBuf::from("."),
        );
        let mut budget = Budget::new(BudgetLimits::default());
        let mut cache = ResultCache::default();
        let change_set = empty_change_set();
        let outcome = runner
            .run(&config, &change_set, &agents, &mut budget, &mut cache, 0)
            .await
            .unwrap();
        assert!(outcome.trace.entries.iter().any(|e| e.agent == "always-succeeds" && e.outcome == "success"));
    }
}
