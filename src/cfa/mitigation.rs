//! Mitigation pattern matching: a registry of built-in and
//! custom patterns checked against call/method/guard nodes, with
//! timeout-protected name-regex evaluation and ReDoS-risk gating at load.

use crate::cfa::cfg::{Cfg, NodeId};
use crate::cfa::pattern_timeout::{match_with_deadline, redos_risk_score, MatchOutcome};
use crate::cfa::severity::VulnerabilityKind;
use crate::config::PatternDefinition;
use crate::security_log::{SecurityLog, SecurityOutcome};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    Block,
    Function,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct MitigationInstance {
    pub pattern_id: String,
    pub node: NodeId,
    pub line: u32,
    pub protected_vars: Vec<String>,
    pub scope: MatchScope,
    pub confidence: Confidence,
    pub call_chain: Vec<(String, String, u32)>,
    pub discovery_depth: u32,
    /// Vulnerability kinds this mitigation instance protects against.
    pub mitigates: Vec<VulnerabilityKind>,
}

struct CompiledPattern {
    id: String,
    exact_names: Vec<String>,
    name_regex: Option<Regex>,
    module: Option<String>,
    mitigates: Vec<VulnerabilityKind>,
}

pub struct MitigationRegistry {
    patterns: Vec<CompiledPattern>,
    pattern_timeout_ms: u64,
}

/// Built-in mitigations recognized without any configuration: common
/// sanitizer/validator/guard call names across the JS/TS ecosystem, each
/// tied to the vulnerability kind(s) it actually protects against.
const BUILTIN_NAMES: &[(&str, &str, &[VulnerabilityKind])] = &[
    ("escape-html", "escapeHtml", &[VulnerabilityKind::Xss]),
    ("escape-html-lib", "escape", &[VulnerabilityKind::Xss]),
    ("sanitize-html", "sanitizeHtml", &[VulnerabilityKind::Xss]),
    ("dompurify", "DOMPurify.sanitize", &[VulnerabilityKind::Xss]),
    ("parameterized-query", "query", &[VulnerabilityKind::SqlInjection]),
    ("prepared-statement", "prepare", &[VulnerabilityKind::SqlInjection]),
    ("path-normalize", "path.normalize", &[VulnerabilityKind::PathTraversal]),
    ("path-resolve", "path.resolve", &[VulnerabilityKind::PathTraversal]),
    ("encode-uri", "encodeURIComponent", &[VulnerabilityKind::Xss]),
];

impl MitigationRegistry {
    pub fn new(
        custom: &[PatternDefinition],
        redos_rejection_threshold: u8,
        whitelist: &[String],
        pattern_timeout_ms: u64,
        log: &SecurityLog,
    ) -> Self {
        let mut patterns: Vec<CompiledPattern> = BUILTIN_NAMES
            .iter()
            .map(|(id, name, mitigates)| CompiledPattern {
                id: id.to_string(),
                exact_names: vec![name.to_string()],
                name_regex: None,
                module: None,
                mitigates: mitigates.to_vec(),
            })
            .collect();

        for def in custom {
            let mitigates: Vec<VulnerabilityKind> = def
                .mitigates
                .iter()
                .filter_map(|k| VulnerabilityKind::parse(k))
                .collect();
            if let Some(regex_src) = &def.name_regex {
                let risk = redos_risk_score(regex_src);
                if risk >= redos_rejection_threshold && !whitelist.contains(&def.id) {
                    log.record(
                        "mitigation_pattern_rejected",
                        &def.id,
                        "",
                        regex_src,
                        0,
                        SecurityOutcome::Denied,
                        Some("ReDoS risk score exceeded rejection threshold"),
                    );
                    continue;
                }
                let Ok(compiled) = Regex::new(regex_src) else {
                    log.record(
                        "mitigation_pattern_rejected",
                        &def.id,
                        "",
                        regex_src,
                        0,
                        SecurityOutcome::Error,
                        Some("invalid regex syntax"),
                    );
                    continue;
                };
                patterns.push(CompiledPattern {
                    id: def.id.clone(),
                    exact_names: def.exact_names.clone(),
                    name_regex: Some(compiled),
                    module: def.module.clone(),
                    mitigates,
                });
            } else {
                patterns.push(CompiledPattern {
                    id: def.id.clone(),
                    exact_names: def.exact_names.clone(),
                    name_regex: None,
                    module: def.module.clone(),
                    mitigates,
                });
            }
        }

        Self {
            patterns,
            pattern_timeout_ms,
        }
    }

    /// Scans every call site in `cfg` for mitigation matches, logging each
    /// decision to the security audit trail.
    pub fn find_mitigations(&self, cfg: &Cfg, file: &str, log: &SecurityLog) -> Vec<MitigationInstance> {
        let mut found = Vec::new();
        for call in &cfg.call_sites {
            for pattern in &self.patterns {
                let start = std::time::Instant::now();
                let exact_match = pattern.exact_names.iter().any(|n| call.callee_name == *n);
                let regex_match = match &pattern.name_regex {
                    Some(re) => match match_with_deadline(re, &call.callee_name, self.pattern_timeout_ms) {
                        MatchOutcome::Matched => true,
                        MatchOutcome::NotMatched => false,
                        MatchOutcome::TimedOut => {
                            log.record(
                                "mitigation",
                                &pattern.id,
                                file,
                                re.as_str(),
                                start.elapsed().as_millis() as u64,
                                SecurityOutcome::Timeout,
                                Some("pattern evaluation exceeded deadline"),
                            );
                            false
                        }
                    },
                    None => false,
                };

                if exact_match || regex_match {
                    let confidence = if pattern.module.is_some() {
                        Confidence::Medium
                    } else {
                        Confidence::High
                    };
                    log.record(
                        "mitigation",
                        &pattern.id,
                        file,
                        &call.callee_name,
                        start.elapsed().as_millis() as u64,
                        SecurityOutcome::Allowed,
                        None,
                    );
                    found.push(MitigationInstance {
                        pattern_id: pattern.id.clone(),
                        node: call.node,
                        line: call.line,
                        protected_vars: Vec::new(),
                        scope: MatchScope::Function,
                        confidence,
                        call_chain: Vec::new(),
                        discovery_depth: 0,
                        mitigates: pattern.mitigates.clone(),
                    });
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sanitizer_names_are_recognized() {
        let log = SecurityLog::new("test-run");
        let registry = MitigationRegistry::new(&[], 70, &[], 100, &log);
        let mut cfg = Cfg::new("f");
        cfg.call_sites.push(crate::cfa::cfg::CallSite {
            callee_name: "escapeHtml".to_string(),
            resolved: true,
            dynamic: false,
            line: 3,
            node: 0,
        });
        let found = registry.find_mitigations(&cfg, "src/x.ts", &log);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].mitigates, vec![crate::cfa::severity::VulnerabilityKind::Xss]);
    }

    #[test]
    fn high_risk_custom_pattern_is_rejected_unless_whitelisted() {
        let log = SecurityLog::new("test-run");
        let risky = PatternDefinition {
            id: "risky".to_string(),
            kind: "sanitizer".to_string(),
            exact_names: vec![],
            name_regex: Some(r"(a+)+$".to_string()),
            module: None,
            mitigates: vec![],
        };
        let rejected = MitigationRegistry::new(&[risky.clone()], 40, &[], 100, &log);
        assert!(rejected.patterns.iter().all(|p| p.id != "risky"));

        let allowed = MitigationRegistry::new(&[risky], 40, &["risky".to_string()], 100, &log);
        assert!(allowed.patterns.iter().any(|p| p.id == "risky"));
    }
}
