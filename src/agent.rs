//! The `Agent` trait and its scoped execution context. Every
//! pass iterates a list of `Box<dyn Agent>`; the CFA core is registered as
//! a built-in agent implementing the same trait as external/LLM agents.

use crate::budget::Budget;
use crate::config::Config;
use crate::diff::ChangeSet;
use crate::types::AgentResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// An allow-listed, scoped environment handed to an agent — never the
/// full process environment, so secrets an agent doesn't need never reach it.
#[derive(Debug, Clone, Default)]
pub struct ScopedEnvironment {
    pub vars: HashMap<String, String>,
}

impl ScopedEnvironment {
    pub fn allow_listed(keys: &[&str]) -> Self {
        let mut vars = HashMap::new();
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Option<String>,
    pub model: Option<String>,
}

pub struct AgentContext<'a> {
    pub change_set: &'a ChangeSet,
    pub repo_root: PathBuf,
    pub config: &'a Config,
    pub environment: ScopedEnvironment,
    pub provider: ResolvedProvider,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    /// Paid, network-calling LLM agents are gated separately by `Budget`
    /// and the main-branch-push policy.
    fn is_paid_llm(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AgentContext<'_>, budget: &mut Budget) -> AgentResult;
}

/// Wraps the in-process CFA core behind the `Agent` trait so it is iterated
/// by `PassRunner` exactly like any external agent.
pub struct CfaAgent;

#[async_trait]
impl Agent for CfaAgent {
    fn id(&self) -> &str {
        "cfa-core"
    }

    fn is_paid_llm(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &AgentContext<'_>, budget: &mut Budget) -> AgentResult {
        crate::cfa::run_cfa(ctx.change_set, &ctx.repo_root, ctx.config, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_environment_only_carries_allow_listed_keys() {
        std::env::set_var("ROUTER_AGENT_TEST_KEY", "secret");
        std::env::set_var("ROUTER_AGENT_TEST_OTHER", "unrelated");
        let env = ScopedEnvironment::allow_listed(&["ROUTER_AGENT_TEST_KEY"]);
        assert_eq!(env.vars.get("ROUTER_AGENT_TEST_KEY").unwrap(), "secret");
        assert!(!env.vars.contains_key("ROUTER_AGENT_TEST_OTHER"));
        std::env::remove_var("ROUTER_AGENT_TEST_KEY");
        std::env::remove_var("ROUTER_AGENT_TEST_OTHER");
    }
}
