//! `SecurityLog`: an append-only, newline-delimited-JSON audit
//! trail of security-relevant decisions, written to stderr independent of
//! the `tracing` subscriber's own formatting. Raw patterns never appear —
//! only a truncated hash.

use crate::types::stable_fingerprint;
use chrono::Utc;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityOutcome {
    Allowed,
    Denied,
    Timeout,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent<'a> {
    pub category: &'a str,
    pub rule_id: &'a str,
    pub file: &'a str,
    pub pattern_hash: String,
    pub duration_ms: u64,
    pub outcome: SecurityOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<&'a str>,
    pub timestamp: String,
    pub run_id: &'a str,
}

pub struct SecurityLog {
    run_id: String,
}

impl SecurityLog {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }

    /// Hashes the raw pattern so the audit trail never carries it verbatim.
    pub fn hash_pattern(pattern: &str) -> String {
        stable_fingerprint(&[pattern])
    }

    /// Writes one NDJSON record to stderr. Never panics or propagates a
    /// write error — a logging failure must not abort analysis.
    pub fn record(
        &self,
        category: &str,
        rule_id: &str,
        file: &str,
        pattern: &str,
        duration_ms: u64,
        outcome: SecurityOutcome,
        error_reason: Option<&str>,
    ) {
        let event = SecurityEvent {
            category,
            rule_id,
            file,
            pattern_hash: Self::hash_pattern(pattern),
            duration_ms,
            outcome,
            error_reason,
            timestamp: Utc::now().to_rfc3339(),
            run_id: &self.run_id,
        };
        if let Ok(line) = serde_json::to_string(&event) {
            let _ = writeln!(std::io::stderr(), "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_never_contains_raw_pattern() {
        let pattern = r"(a+)+$";
        let hash = SecurityLog::hash_pattern(pattern);
        assert!(!hash.contains(pattern));
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn record_does_not_panic_on_any_input() {
        let log = SecurityLog::new("run-1");
        log.record(
            "mitigation",
            "SQLI-001",
            "src/db.rs",
            r"(a+)+$",
            5,
            SecurityOutcome::Allowed,
            None,
        );
        log.record(
            "mitigation",
            "SQLI-002",
            "src/db.rs",
            r".*",
            250,
            SecurityOutcome::Timeout,
            Some("pattern exceeded deadline"),
        );
    }
}
