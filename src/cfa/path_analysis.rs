//! Path coverage analysis: bounded DFS from entry to a sink,
//! classifying coverage as full/partial/none under explicit traversal caps.

use crate::cfa::cfg::{Cfg, NodeId};
use crate::cfa::mitigation::MitigationInstance;
use crate::cfa::severity::VulnerabilityKind;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    Full,
    Partial,
    None,
}

#[derive(Debug, Clone)]
pub struct TraversalState {
    pub nodes_visited: u64,
    pub max_nodes_visited: u64,
    pub limit_reached: bool,
    pub reason: Option<String>,
}

impl TraversalState {
    fn new(max_nodes_visited: u64) -> Self {
        Self {
            nodes_visited: 0,
            max_nodes_visited,
            limit_reached: false,
            reason: None,
        }
    }

    /// "Strictly greater than": exactly-at-limit is allowed; limit+1 stops.
    fn tick(&mut self) -> bool {
        self.nodes_visited += 1;
        if self.nodes_visited > self.max_nodes_visited {
            self.limit_reached = true;
            self.reason = Some("node_limit_exceeded".to_string());
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct PathAnalysis {
    pub status: CoverageStatus,
    pub coverage_percent: f64,
    pub total_paths: usize,
    pub mitigated_paths: usize,
    pub degraded: bool,
    pub conservative_fallback: bool,
    pub unprotected_path_signatures: Vec<String>,
}

pub struct PathAnalysisLimits {
    pub max_paths: usize,
    pub max_path_length: usize,
    pub max_nodes_visited: u64,
}

impl Default for PathAnalysisLimits {
    fn default() -> Self {
        Self {
            max_paths: 100,
            max_path_length: 50,
            max_nodes_visited: 10_000,
        }
    }
}

pub fn is_reachable(cfg: &Cfg, from: NodeId, to: NodeId) -> bool {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(from);
    visited.insert(from);
    while let Some(n) = queue.pop_front() {
        if n == to {
            return true;
        }
        for (succ, _) in cfg.successors(n) {
            if visited.insert(succ) {
                queue.push_back(succ);
            }
        }
    }
    false
}

/// Enumerates entry→sink paths with per-call visited sets (preventing
/// cycles within a single path) and accumulates mitigations encountered.
pub fn analyze_paths(
    cfg: &Cfg,
    sink: NodeId,
    kind: VulnerabilityKind,
    mitigations_by_node: &[(NodeId, &MitigationInstance)],
    limits: &PathAnalysisLimits,
) -> PathAnalysis {
    if !is_reachable(cfg, cfg.entry, sink) {
        return PathAnalysis {
            status: CoverageStatus::None,
            coverage_percent: 0.0,
            total_paths: 0,
            mitigated_paths: 0,
            degraded: false,
            conservative_fallback: false,
            unprotected_path_signatures: Vec::new(),
        };
    }

    let mut state = TraversalState::new(limits.max_nodes_visited);
    let mut total_paths = 0usize;
    let mut mitigated_paths = 0usize;
    let mut unprotected_signatures = Vec::new();
    let mut degraded_by_cap = false;

    let mut stack: Vec<(NodeId, Vec<NodeId>, HashSet<NodeId>)> =
        vec![(cfg.entry, vec![cfg.entry], HashSet::from([cfg.entry]))];

    while let Some((node, path, visited)) = stack.pop() {
        if !state.tick() {
            degraded_by_cap = true;
            break;
        }
        if total_paths >= limits.max_paths {
            degraded_by_cap = true;
            break;
        }
        if path.len() > limits.max_path_length {
            degraded_by_cap = true;
            continue;
        }

        if node == sink {
            total_paths += 1;
            // The sink's own node is excluded: a mitigation that lands on
            // the exact same node as the sink call (e.g. a sink and a
            // same-named mitigation sharing one CFG node) must not be
            // treated as preceding it on the path.
            let preceding = &path[..path.len().saturating_sub(1)];
            let path_has_mitigation = preceding.iter().any(|n| {
                mitigations_by_node
                    .iter()
                    .any(|(mn, m)| mn == n && m.mitigates.contains(&kind))
            });
            if path_has_mitigation {
                mitigated_paths += 1;
            } else {
                unprotected_signatures.push(format!("path:{}", path_signature(&path)));
            }
            continue;
        }

        for (succ, _) in cfg.successors(node) {
            if visited.contains(&succ) {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(succ);
            let mut next_visited = visited.clone();
            next_visited.insert(succ);
            stack.push((succ, next_path, next_visited));
        }
    }

    let coverage_percent = if total_paths == 0 {
        0.0
    } else {
        mitigated_paths as f64 / total_paths as f64 * 100.0
    };

    let mut status = if total_paths == 0 {
        CoverageStatus::None
    } else if mitigated_paths == total_paths {
        CoverageStatus::Full
    } else if mitigated_paths > 0 {
        CoverageStatus::Partial
    } else {
        CoverageStatus::None
    };

    if degraded_by_cap && status == CoverageStatus::Full {
        status = CoverageStatus::Partial;
    }

    PathAnalysis {
        status,
        coverage_percent,
        total_paths,
        mitigated_paths,
        degraded: degraded_by_cap || state.limit_reached,
        conservative_fallback: false,
        unprotected_path_signatures: unprotected_signatures,
    }
}

fn path_signature(path: &[NodeId]) -> String {
    path.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(">")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::cfg::{EdgeKind, NodeKind};

    #[test]
    fn unreachable_sink_yields_none_status() {
        let mut cfg = Cfg::new("f");
        let entry = cfg.add_node(NodeKind::Entry, 1, 1);
        cfg.entry = entry;
        let sink = cfg.add_node(NodeKind::Call, 2, 2);
        // no edge from entry to sink
        let analysis = analyze_paths(
            &cfg,
            sink,
            crate::cfa::severity::VulnerabilityKind::Xss,
            &[],
            &PathAnalysisLimits::default(),
        );
        assert_eq!(analysis.status, CoverageStatus::None);
        assert_eq!(analysis.total_paths, 0);
    }

    #[test]
    fn fully_mitigated_single_path_is_full() {
        let mut cfg = Cfg::new("f");
        let entry = cfg.add_node(NodeKind::Entry, 1, 1);
        cfg.entry = entry;
        let mit = cfg.add_node(NodeKind::Call, 2, 2);
        let sink = cfg.add_node(NodeKind::Call, 3, 3);
        cfg.add_edge(entry, mit, EdgeKind::Sequential);
        cfg.add_edge(mit, sink, EdgeKind::Sequential);

        let instance = MitigationInstance {
            pattern_id: "escape-html".into(),
            node: mit,
            line: 2,
            protected_vars: vec![],
            scope: crate::cfa::mitigation::MatchScope::Function,
            confidence: crate::cfa::mitigation::Confidence::High,
            call_chain: vec![],
            discovery_depth: 0,
            mitigates: vec![crate::cfa::severity::VulnerabilityKind::Xss],
        };
        let binding = [(mit, &instance)];
        let analysis = analyze_paths(
            &cfg,
            sink,
            crate::cfa::severity::VulnerabilityKind::Xss,
            &binding,
            &PathAnalysisLimits::default(),
        );
        assert_eq!(analysis.status, CoverageStatus::Full);
        assert_eq!(analysis.coverage_percent, 100.0);
    }

    #[test]
    fn mitigation_of_wrong_kind_does_not_cover_path() {
        let mut cfg = Cfg::new("f");
        let entry = cfg.add_node(NodeKind::Entry, 1, 1);
        cfg.entry = entry;
        let mit = cfg.add_node(NodeKind::Call, 2, 2);
        let sink = cfg.add_node(NodeKind::Call, 3, 3);
        cfg.add_edge(entry, mit, EdgeKind::Sequential);
        cfg.add_edge(mit, sink, EdgeKind::Sequential);

        let instance = MitigationInstance {
            pattern_id: "escape-html".into(),
            node: mit,
            line: 2,
            protected_vars: vec![],
            scope: crate::cfa::mitigation::MatchScope::Function,
            confidence: crate::cfa::mitigation::Confidence::High,
            call_chain: vec![],
            discovery_depth: 0,
            mitigates: vec![crate::cfa::severity::VulnerabilityKind::Xss],
        };
        let binding = [(mit, &instance)];
        let analysis = analyze_paths(
            &cfg,
            sink,
            crate::cfa::severity::VulnerabilityKind::SqlInjection,
            &binding,
            &PathAnalysisLimits::default(),
        );
        assert_eq!(analysis.status, CoverageStatus::None);
    }

    #[test]
    fn mitigation_on_sink_node_itself_does_not_self_mitigate() {
        let mut cfg = Cfg::new("f");
        let entry = cfg.add_node(NodeKind::Entry, 1, 1);
        cfg.entry = entry;
        let sink = cfg.add_node(NodeKind::Call, 2, 2);
        cfg.add_edge(entry, sink, EdgeKind::Sequential);

        let instance = MitigationInstance {
            pattern_id: "parameterized-query".into(),
            node: sink,
            line: 2,
            protected_vars: vec![],
            scope: crate::cfa::mitigation::MatchScope::Function,
            confidence: crate::cfa::mitigation::Confidence::High,
            call_chain: vec![],
            discovery_depth: 0,
            mitigates: vec![crate::cfa::severity::VulnerabilityKind::SqlInjection],
        };
        let binding = [(sink, &instance)];
        let analysis = analyze_paths(
            &cfg,
            sink,
            crate::cfa::severity::VulnerabilityKind::SqlInjection,
            &binding,
            &PathAnalysisLimits::default(),
        );
        assert_eq!(analysis.status, CoverageStatus::None);
    }
}
