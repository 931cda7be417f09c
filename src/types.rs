//! Core result types shared across the diff, analysis, and reporting stages:
//! `Finding`, `Severity`, `AgentResult`, and `ExecutionTrace`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Hard caps enforced by `FindingPipeline::sanitize`.
pub const MAX_MESSAGE_LEN: usize = 4000;
pub const MAX_SUGGESTION_LEN: usize = 2000;
pub const MAX_RULE_ID_LEN: usize = 200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Ordered so that `Error < Warning < Info` sorts worst-first with
    /// `Ord` ascending; `FindingPipeline` sorts findings by this order.
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Error => "\u{1F534}",
            Severity::Warning => "\u{1F7E1}",
            Severity::Info => "\u{2139}\u{FE0F}",
        }
    }

    /// Downgrade by `levels`, saturating at `Info`. Never raises severity.
    pub fn downgrade(self, levels: u8) -> Severity {
        let rank = match self {
            Severity::Error => 0u8,
            Severity::Warning => 1,
            Severity::Info => 2,
        };
        match rank.saturating_add(levels) {
            0 => Severity::Error,
            1 => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a finding came from a fully successful agent run or was salvaged
/// from a failed one. Partial findings are posted but never gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Complete,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub file: String,
    pub line: Option<u32>,
    pub end_line: Option<u32>,
    pub message: String,
    pub suggestion: Option<String>,
    pub rule_id: String,
    pub source_agent: String,
    pub fingerprint: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub provenance: Provenance,
}

impl Finding {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        severity: Severity,
        file: impl Into<String>,
        line: Option<u32>,
        message: impl Into<String>,
        rule_id: impl Into<String>,
        source_agent: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            file: file.into(),
            line,
            end_line: None,
            message: message.into(),
            suggestion: None,
            rule_id: rule_id.into(),
            source_agent: source_agent.into(),
            fingerprint: fingerprint.into(),
            metadata: HashMap::new(),
            provenance: Provenance::Complete,
        }
    }

    pub fn with_end_line(mut self, end_line: u32) -> Self {
        self.end_line = Some(end_line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn as_partial(mut self) -> Self {
        self.provenance = Provenance::Partial;
        self
    }

    /// The fingerprint marker embedded as a hidden HTML comment in every
    /// inline comment body. Payload derives from file/line/rule/
    /// agent/content-hash so a later run can recognize its own output.
    pub fn marker(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.message.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize())[..12].to_string();
        format!(
            "<!-- review-router:fp={}:{}:{}:{}:{} -->",
            self.file,
            self.line.unwrap_or(0),
            self.rule_id,
            self.source_agent,
            content_hash
        )
    }
}

/// Truncated SHA-256 fingerprint over `(file, functionName, vulnerabilityKind,
/// sinkLine, affectedVariable)`. Also reused generically by non-CFA agents
/// over whatever identity tuple they provide.
pub fn stable_fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// `AgentResult`: a tagged union. Deliberately not a "success
/// flag + optional error + optional partial" struct — that shape permits
/// invalid states (success with an error set, failure with full findings).
/// A fourth variant here is a compile-time error at every match site.
#[derive(Debug, Clone)]
pub enum AgentResult {
    Success {
        findings: Vec<Finding>,
        metrics: AgentMetrics,
    },
    Failure {
        error: String,
        stage: String,
        partial_findings: Vec<Finding>,
        metrics: AgentMetrics,
    },
    Skipped {
        reason: String,
        metrics: AgentMetrics,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub duration_ms: u64,
    pub estimated_tokens: u64,
    pub estimated_usd: f64,
}

impl AgentResult {
    /// Findings ready for the `complete` stream, stamped with provenance.
    pub fn complete_findings(&self) -> Vec<Finding> {
        match self {
            AgentResult::Success { findings, .. } => findings
                .iter()
                .cloned()
                .map(|f| Finding {
                    provenance: Provenance::Complete,
                    ..f
                })
                .collect(),
            AgentResult::Failure { .. } | AgentResult::Skipped { .. } => Vec::new(),
        }
    }

    /// Findings ready for the `partial` stream, stamped with provenance.
    pub fn partial_findings(&self) -> Vec<Finding> {
        match self {
            AgentResult::Failure {
                partial_findings, ..
            } => partial_findings
                .iter()
                .cloned()
                .map(|f| f.as_partial())
                .collect(),
            AgentResult::Success { .. } | AgentResult::Skipped { .. } => Vec::new(),
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            AgentResult::Success { .. } => "success",
            AgentResult::Failure { .. } => "failure",
            AgentResult::Skipped { .. } => "skipped",
        }
    }

    pub fn metrics(&self) -> &AgentMetrics {
        match self {
            AgentResult::Success { metrics, .. } => metrics,
            AgentResult::Failure { metrics, .. } => metrics,
            AgentResult::Skipped { metrics, .. } => metrics,
        }
    }
}

/// One entry in the `PassRunner`'s append-only `ExecutionTrace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub pass: String,
    pub agent: String,
    pub outcome: String,
    pub duration_ms: u64,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub entries: Vec<TraceEntry>,
    pub skipped_reasons: Vec<String>,
}

impl ExecutionTrace {
    pub fn record(&mut self, pass: &str, agent: &str, result: &AgentResult, cache_hit: bool) {
        self.entries.push(TraceEntry {
            pass: pass.to_string(),
            agent: agent.to_string(),
            outcome: result.outcome_label().to_string(),
            duration_ms: result.metrics().duration_ms,
            cache_hit,
        });
        if let AgentResult::Skipped { reason, .. } = result {
            self.skipped_reasons.push(reason.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_worst_first() {
        let mut sevs = vec![Severity::Info, Severity::Error, Severity::Warning];
        sevs.sort();
        assert_eq!(sevs, vec![Severity::Error, Severity::Warning, Severity::Info]);
    }

    #[test]
    fn downgrade_never_raises_severity() {
        assert_eq!(Severity::Error.downgrade(0), Severity::Error);
        assert_eq!(Severity::Error.downgrade(1), Severity::Warning);
        assert_eq!(Severity::Error.downgrade(2), Severity::Info);
        assert_eq!(Severity::Error.downgrade(5), Severity::Info);
        assert_eq!(Severity::Info.downgrade(3), Severity::Info);
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let a = stable_fingerprint(&["file.rs", "foo", "sql_injection", "10", "user_input"]);
        let b = stable_fingerprint(&["file.rs", "foo", "sql_injection", "10", "user_input"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
