//! Inter-procedural extension: follows resolvable, non-dynamic
//! call sites up to `maxCallDepth`, collecting cross-file mitigations.

use crate::cfa::cfg::{Cfg, NodeId};
use crate::cfa::mitigation::{Confidence, MatchScope, MitigationInstance, MitigationRegistry};
use crate::security_log::SecurityLog;
use std::collections::HashMap;

pub const MAX_CROSS_FILE_MITIGATIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct CrossFileMitigation {
    pub mitigation: MitigationInstance,
    pub call_chain: Vec<(String, String, u32)>,
    pub discovery_depth: u32,
    /// The node in the root (starting) CFG whose call site led to this
    /// mitigation, i.e. where it should be bound for path analysis there.
    pub root_node: NodeId,
}

pub struct CallGraph<'a> {
    /// function name -> (file, cfg)
    pub functions: HashMap<String, (String, &'a Cfg)>,
}

/// Recursively resolves call sites from `cfg`, crediting cross-file
/// mitigations to the call chain that reached them. Unresolved/dynamic
/// calls stop recursion and set `conservative_assumption`.
pub fn collect_cross_file_mitigations(
    graph: &CallGraph,
    start_cfg: &Cfg,
    start_file: &str,
    registry: &MitigationRegistry,
    log: &SecurityLog,
    max_call_depth: u32,
) -> (Vec<CrossFileMitigation>, bool) {
    let mut found = Vec::new();
    let mut conservative_fallback = false;
    let mut visited_functions = std::collections::HashSet::new();
    visited_functions.insert(start_cfg.function_name.clone());

    recurse(
        graph,
        start_cfg,
        start_file,
        registry,
        log,
        0,
        max_call_depth,
        &mut vec![],
        &mut visited_functions,
        &mut found,
        &mut conservative_fallback,
        None,
    );

    if found.len() > MAX_CROSS_FILE_MITIGATIONS {
        found.truncate(MAX_CROSS_FILE_MITIGATIONS);
    }

    (found, conservative_fallback)
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    graph: &CallGraph,
    cfg: &Cfg,
    file: &str,
    registry: &MitigationRegistry,
    log: &SecurityLog,
    depth: u32,
    max_depth: u32,
    chain: &mut Vec<(String, String, u32)>,
    visited_functions: &mut std::collections::HashSet<String>,
    found: &mut Vec<CrossFileMitigation>,
    conservative_fallback: &mut bool,
    root_node: Option<NodeId>,
) {
    if depth >= max_depth {
        *conservative_fallback = true;
        return;
    }

    for call in &cfg.call_sites {
        if call.dynamic {
            *conservative_fallback = true;
            continue;
        }
        let Some((callee_file, callee_cfg)) = graph.functions.get(&call.callee_name) else {
            *conservative_fallback = true;
            continue;
        };
        if !visited_functions.insert(call.callee_name.clone()) {
            continue;
        }

        // The root node is fixed at the outermost call site: that is the
        // node in the starting CFG a mitigation found at any depth must be
        // bound to for the starting function's own path analysis.
        let this_root_node = root_node.unwrap_or(call.node);

        chain.push((cfg.function_name.clone(), file.to_string(), call.line));
        let local_mitigations = registry.find_mitigations(callee_cfg, callee_file, log);
        for mitigation in local_mitigations {
            if found.len() >= MAX_CROSS_FILE_MITIGATIONS {
                break;
            }
            found.push(CrossFileMitigation {
                mitigation: MitigationInstance {
                    confidence: downgrade_confidence(Confidence::High),
                    scope: MatchScope::Function,
                    ..mitigation
                },
                call_chain: chain.clone(),
                discovery_depth: depth + 1,
                root_node: this_root_node,
            });
        }

        recurse(
            graph,
            callee_cfg,
            callee_file,
            registry,
            log,
            depth + 1,
            max_depth,
            chain,
            visited_functions,
            found,
            conservative_fallback,
            Some(this_root_node),
        );
        chain.pop();
    }
}

fn downgrade_confidence(c: Confidence) -> Confidence {
    match c {
        Confidence::High => Confidence::Medium,
        Confidence::Medium => Confidence::Low,
        Confidence::Low => Confidence::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::cfg::NodeKind;

    #[test]
    fn depth_limit_sets_conservative_fallback() {
        let mut caller = Cfg::new("caller");
        let entry = caller.add_node(NodeKind::Entry, 1, 1);
        caller.entry = entry;
        caller.call_sites.push(crate::cfa::cfg::CallSite {
            callee_name: "callee".into(),
            resolved: true,
            dynamic: false,
            line: 2,
            node: entry,
        });

        let callee = Cfg::new("callee");
        let mut functions = HashMap::new();
        functions.insert("callee".to_string(), ("other.ts".to_string(), &callee));
        let graph = CallGraph { functions };

        let log = SecurityLog::new("run");
        let registry = MitigationRegistry::new(&[], 70, &[], 100, &log);

        let (_found, conservative) =
            collect_cross_file_mitigations(&graph, &caller, "caller.ts", &registry, &log, 0);
        assert!(conservative);
    }

    #[test]
    fn dynamic_call_sets_conservative_assumption() {
        let mut caller = Cfg::new("caller");
        let entry = caller.add_node(NodeKind::Entry, 1, 1);
        caller.entry = entry;
        caller.call_sites.push(crate::cfa::cfg::CallSite {
            callee_name: "handlers[name]".into(),
            resolved: false,
            dynamic: true,
            line: 2,
            node: entry,
        });
        let graph = CallGraph {
            functions: HashMap::new(),
        };
        let log = SecurityLog::new("run");
        let registry = MitigationRegistry::new(&[], 70, &[], 100, &log);
        let (_found, conservative) =
            collect_cross_file_mitigations(&graph, &caller, "caller.ts", &registry, &log, 5);
        assert!(conservative);
    }
}
