//! CFA core top-level entry point: the built-in, always-enabled,
//! in-process agent that turns a `ChangeSet` into `Finding`s.

use crate::budget::Budget;
use crate::cfa::async_refine::{apply_async_refinement, refine_async_paths};
use crate::cfa::builder::build_cfgs;
use crate::cfa::interprocedural::CallGraph;
use crate::cfa::mitigation::{MitigationInstance, MitigationRegistry};
use crate::cfa::parser::{detect_language, parse};
use crate::cfa::path_analysis::{analyze_paths, PathAnalysisLimits};
use crate::cfa::severity::{emit_finding, VulnerabilityKind};
use crate::config::{Config, PatternDefinition};
use crate::diff::ChangeSet;
use crate::security_log::SecurityLog;
use crate::types::{AgentMetrics, AgentResult, Finding};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Sink-bearing call names that plausibly route to the listed
/// vulnerability kind; a minimal built-in table, extended by config.
const SINK_TABLE: &[(&str, VulnerabilityKind)] = &[
    ("innerHTML", VulnerabilityKind::Xss),
    ("dangerouslySetInnerHTML", VulnerabilityKind::Xss),
    ("document.write", VulnerabilityKind::Xss),
    ("query", VulnerabilityKind::SqlInjection),
    ("execute", VulnerabilityKind::SqlInjection),
    ("exec", VulnerabilityKind::CommandInjection),
    ("execSync", VulnerabilityKind::CommandInjection),
    ("readFile", VulnerabilityKind::PathTraversal),
    ("fetch", VulnerabilityKind::Ssrf),
    ("JSON.parse", VulnerabilityKind::InsecureDeserialization),
];

pub fn run_cfa(change_set: &ChangeSet, repo_root: &Path, config: &Config, budget: &mut Budget) -> AgentResult {
    let start = Instant::now();
    let log = SecurityLog::new("cfa-run");
    let registry = MitigationRegistry::new(
        &config.patterns.custom,
        config.patterns.redos_rejection_threshold.unwrap_or(70),
        &config.patterns.whitelist,
        config.patterns.pattern_timeout_ms.unwrap_or(100),
        &log,
    );

    let mut findings = Vec::new();
    let mut any_conservative_fallback = false;

    for file in &change_set.files {
        if !file.can_comment() {
            continue;
        }
        if !budget.should_analyze_file(&file.path) {
            continue;
        }
        let Some(language) = detect_language(Path::new(&file.path)) else {
            continue;
        };
        let full_path = repo_root.join(&file.path);
        let Ok(content) = std::fs::read_to_string(&full_path) else {
            continue;
        };
        budget.record_file(content.lines().count() as u64);

        let Some(tree) = parse(&content, language) else {
            continue;
        };
        let cfgs = build_cfgs(&tree, &content, language);

        let mut functions: HashMap<String, (String, &crate::cfa::cfg::Cfg)> = HashMap::new();
        for cfg in &cfgs {
            functions.insert(cfg.function_name.clone(), (file.path.clone(), cfg));
        }
        let graph = CallGraph { functions };

        for cfg in &cfgs {
            budget.record_nodes_visited(cfg.nodes.len() as u64);
            let mitigations = registry.find_mitigations(cfg, &file.path, &log);

            let (cross_file, conservative_fallback) = crate::cfa::interprocedural::collect_cross_file_mitigations(
                &graph,
                cfg,
                &file.path,
                &registry,
                &log,
                config.budget.max_call_depth,
            );
            any_conservative_fallback = any_conservative_fallback || conservative_fallback;

            let mitigations_by_node: Vec<(_, &MitigationInstance)> = mitigations
                .iter()
                .map(|m| (m.node, m))
                .chain(cross_file.iter().map(|cf| (cf.root_node, &cf.mitigation)))
                .collect();

            for node in &cfg.nodes {
                for stmt in &node.statements {
                    let Some((_, kind)) = SINK_TABLE.iter().find(|(name, _)| stmt.contains(name)) else {
                        continue;
                    };
                    let limits = PathAnalysisLimits {
                        max_nodes_visited: config.budget.max_nodes_visited,
                        ..PathAnalysisLimits::default()
                    };
                    let mut analysis = analyze_paths(cfg, node.id, *kind, &mitigations_by_node, &limits);
                    if cfg.is_async {
                        let refinement = refine_async_paths(cfg, node.id, &mitigations_by_node);
                        apply_async_refinement(&mut analysis, &refinement);
                        any_conservative_fallback = any_conservative_fallback || refinement.conservative_fallback;
                    }
                    if let Some(finding) = emit_finding(
                        *kind,
                        &file.path,
                        &cfg.function_name,
                        node.line_start,
                        "input",
                        &analysis,
                        any_conservative_fallback,
                    ) {
                        findings.push(finding);
                    }
                }
            }
        }

        if !budget.should_continue() {
            break;
        }
    }

    let metrics = AgentMetrics {
        duration_ms: start.elapsed().as_millis() as u64,
        estimated_tokens: 0,
        estimated_usd: 0.0,
    };

    AgentResult::Success { findings, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetLimits;
    use crate::diff::{ChangeSetSource, ChangedFile, FileStatus};
    use std::io::Write;

    #[test]
    fn detects_unmitigated_sink_in_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("handler.js");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "function handler(req) {{ db.query(req.body); }}").unwrap();

        let change_set = ChangeSet {
            base_ref: "main".into(),
            head_ref: "feature".into(),
            base_sha: "a".into(),
            head_sha: "b".into(),
            check_sha: "b".into(),
            files: vec![ChangedFile {
                path: "handler.js".into(),
                old_path: None,
                status: FileStatus::Modified,
                additions: 1,
                deletions: 0,
                patch: Some("@@ -0,0 +1 @@\n+function handler(req) { db.query(req.body); }\n".into()),
                is_binary: false,
            }],
            total_additions: 1,
            total_deletions: 0,
            unified_context_lines: 3,
            source: ChangeSetSource::Range,
        };

        let config = Config::default();
        let mut budget = Budget::new(BudgetLimits::default());
        let result = run_cfa(&change_set, dir.path(), &config, &mut budget);
        match result {
            AgentResult::Success { findings, .. } => {
                assert!(!findings.is_empty());
            }
            _ => panic!("expected success"),
        }
    }
}
