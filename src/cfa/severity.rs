//! Severity & finding emission: downgrade rules on partial
//! coverage, full-mitigation suppression, and the CFA stable fingerprint.

use crate::cfa::path_analysis::{CoverageStatus, PathAnalysis};
use crate::types::{stable_fingerprint, Finding, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VulnerabilityKind {
    Xss,
    SqlInjection,
    PathTraversal,
    CommandInjection,
    Ssrf,
    InsecureDeserialization,
}

impl VulnerabilityKind {
    pub fn base_severity(self) -> Severity {
        match self {
            VulnerabilityKind::SqlInjection
            | VulnerabilityKind::CommandInjection
            | VulnerabilityKind::InsecureDeserialization => Severity::Error,
            VulnerabilityKind::Xss | VulnerabilityKind::Ssrf => Severity::Error,
            VulnerabilityKind::PathTraversal => Severity::Warning,
        }
    }

    pub fn kind_str(self) -> &'static str {
        match self {
            VulnerabilityKind::Xss => "xss",
            VulnerabilityKind::SqlInjection => "sql-injection",
            VulnerabilityKind::PathTraversal => "path-traversal",
            VulnerabilityKind::CommandInjection => "command-injection",
            VulnerabilityKind::Ssrf => "ssrf",
            VulnerabilityKind::InsecureDeserialization => "insecure-deserialization",
        }
    }

    /// Reverse lookup of `kind_str`, for config-driven `mitigates` lists.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "xss" => Some(VulnerabilityKind::Xss),
            "sql-injection" => Some(VulnerabilityKind::SqlInjection),
            "path-traversal" => Some(VulnerabilityKind::PathTraversal),
            "command-injection" => Some(VulnerabilityKind::CommandInjection),
            "ssrf" => Some(VulnerabilityKind::Ssrf),
            "insecure-deserialization" => Some(VulnerabilityKind::InsecureDeserialization),
            _ => None,
        }
    }
}

/// Applies the coverage downgrade table: ≥75% coverage → down 2 levels;
/// ≥50% → down 1; full coverage suppresses entirely (returns `None`).
pub fn emit_finding(
    kind: VulnerabilityKind,
    file: &str,
    function_name: &str,
    sink_line: u32,
    affected_variable: &str,
    analysis: &PathAnalysis,
    pattern_timeout_occurred: bool,
) -> Option<Finding> {
    if analysis.status == CoverageStatus::Full {
        return None;
    }
    if analysis.total_paths == 0 {
        return None;
    }

    let downgrade_levels: u8 = if analysis.coverage_percent >= 75.0 {
        2
    } else if analysis.coverage_percent >= 50.0 {
        1
    } else {
        0
    };

    let severity = kind.base_severity().downgrade(downgrade_levels);

    let mut message = format!(
        "{} potentially reachable in `{function_name}`: {:.0}% of {} path(s) mitigated, {} unprotected.",
        kind.kind_str(),
        analysis.coverage_percent,
        analysis.total_paths,
        analysis.total_paths - analysis.mitigated_paths,
    );
    if !analysis.unprotected_path_signatures.is_empty() {
        message.push_str(&format!(
            " Unprotected paths: {}.",
            analysis.unprotected_path_signatures.join(", ")
        ));
    }
    if analysis.degraded {
        message.push_str(" Analysis hit a traversal cap; results may be conservative.");
    }
    if analysis.conservative_fallback {
        message.push_str(" An unresolved call inside async flow could not be followed; results may be conservative.");
    }
    if pattern_timeout_occurred {
        message.push_str(" A mitigation pattern timed out; results may be conservative.");
    }

    let fingerprint = stable_fingerprint(&[file, function_name, kind.kind_str(), &sink_line.to_string(), affected_variable]);
    let rule_id = format!("cfa/{}", kind.kind_str());

    Some(Finding::new(
        severity,
        file.to_string(),
        Some(sink_line),
        message,
        rule_id,
        "cfa-core".to_string(),
        fingerprint,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::path_analysis::PathAnalysis;

    fn analysis(coverage: f64, total: usize, mitigated: usize) -> PathAnalysis {
        PathAnalysis {
            status: if mitigated == total && total > 0 {
                CoverageStatus::Full
            } else if mitigated > 0 {
                CoverageStatus::Partial
            } else {
                CoverageStatus::None
            },
            coverage_percent: coverage,
            total_paths: total,
            mitigated_paths: mitigated,
            degraded: false,
            conservative_fallback: false,
            unprotected_path_signatures: vec![],
        }
    }

    #[test]
    fn full_coverage_suppresses_finding() {
        let a = analysis(100.0, 2, 2);
        let finding = emit_finding(VulnerabilityKind::Xss, "f.ts", "handler", 10, "input", &a, false);
        assert!(finding.is_none());
    }

    #[test]
    fn high_partial_coverage_downgrades_two_levels() {
        let a = analysis(80.0, 5, 4);
        let finding = emit_finding(VulnerabilityKind::SqlInjection, "f.ts", "handler", 10, "input", &a, false)
            .unwrap();
        assert_eq!(finding.severity, Severity::Error.downgrade(2));
    }

    #[test]
    fn no_coverage_keeps_base_severity() {
        let a = analysis(0.0, 3, 0);
        let finding = emit_finding(VulnerabilityKind::Xss, "f.ts", "handler", 10, "input", &a, false).unwrap();
        assert_eq!(finding.severity, Severity::Error);
    }
}
