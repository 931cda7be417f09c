//! Async-aware refinement: mitigations on the entry→await
//! segment are credited to the pre-await protection when the sink is only
//! reachable from beyond the await boundary.

use crate::cfa::cfg::{Cfg, NodeId, NodeKind};
use crate::cfa::mitigation::MitigationInstance;
use crate::cfa::path_analysis::{is_reachable, CoverageStatus, PathAnalysis};

#[derive(Debug, Clone, Default)]
pub struct AsyncRefinement {
    pub pre_await_mitigations: Vec<NodeId>,
    pub cross_function_async: bool,
    pub conservative_fallback: bool,
}

pub fn refine_async_paths(
    cfg: &Cfg,
    sink: NodeId,
    mitigations_by_node: &[(NodeId, &MitigationInstance)],
) -> AsyncRefinement {
    let mut refinement = AsyncRefinement::default();

    if !cfg.is_async {
        return refinement;
    }

    let await_nodes: Vec<NodeId> = cfg
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Await)
        .map(|n| n.id)
        .collect();

    for await_node in await_nodes {
        if !is_reachable(cfg, await_node, sink) {
            continue;
        }
        // Credit every mitigation that can reach this await node before it.
        for (node, _) in mitigations_by_node {
            if is_reachable(cfg, cfg.entry, *node) && is_reachable(cfg, *node, await_node) {
                refinement.pre_await_mitigations.push(*node);
            }
        }
    }

    let has_unresolved_call_in_await = cfg.is_async
        && cfg.call_sites.iter().any(|c| !c.resolved && !c.dynamic);
    if has_unresolved_call_in_await {
        refinement.cross_function_async = true;
        refinement.conservative_fallback = true;
    }

    refinement
}

/// Folds an `AsyncRefinement` back into a `PathAnalysis`: a mitigation
/// proven to reach the await boundary before it, on an await that itself
/// reaches the sink, is credited exactly as if it had been found directly
/// on the sink's path. An unresolved call inside the async function marks
/// the analysis conservative so downstream reporting notes the caveat.
pub fn apply_async_refinement(analysis: &mut PathAnalysis, refinement: &AsyncRefinement) {
    if refinement.conservative_fallback {
        analysis.conservative_fallback = true;
    }
    if !refinement.pre_await_mitigations.is_empty() && analysis.mitigated_paths < analysis.total_paths {
        analysis.mitigated_paths = analysis.total_paths;
        analysis.coverage_percent = 100.0;
        analysis.unprotected_path_signatures.clear();
        analysis.status = if analysis.degraded {
            CoverageStatus::Partial
        } else {
            CoverageStatus::Full
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::cfg::EdgeKind;

    #[test]
    fn mitigation_before_await_is_credited() {
        let mut cfg = Cfg::new("f");
        cfg.is_async = true;
        let entry = cfg.add_node(NodeKind::Entry, 1, 1);
        cfg.entry = entry;
        let mit = cfg.add_node(NodeKind::Call, 2, 2);
        let await_node = cfg.add_node(NodeKind::Await, 3, 3);
        let sink = cfg.add_node(NodeKind::Call, 4, 4);
        cfg.add_edge(entry, mit, EdgeKind::Sequential);
        cfg.add_edge(mit, await_node, EdgeKind::Await);
        cfg.add_edge(await_node, sink, EdgeKind::Sequential);

        let instance = MitigationInstance {
            pattern_id: "x".into(),
            node: mit,
            line: 2,
            protected_vars: vec![],
            scope: crate::cfa::mitigation::MatchScope::Function,
            confidence: crate::cfa::mitigation::Confidence::High,
            call_chain: vec![],
            discovery_depth: 0,
            mitigates: vec![],
        };
        let binding = [(mit, &instance)];
        let refinement = refine_async_paths(&cfg, sink, &binding);
        assert!(refinement.pre_await_mitigations.contains(&mit));
    }
}
