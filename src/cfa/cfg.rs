//! Control-flow graph data model. Node ids are stable within
//! one build but not across builds — callers must not persist them.

use std::collections::HashSet;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Entry,
    Exit,
    Throw,
    Basic,
    Branch,
    Merge,
    LoopHeader,
    LoopBody,
    Call,
    Await,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Sequential,
    BranchTrue,
    BranchFalse,
    LoopBack,
    LoopExit,
    Exception,
    Return,
    Await,
}

#[derive(Debug, Clone)]
pub struct CallSite {
    pub callee_name: String,
    pub resolved: bool,
    pub dynamic: bool,
    pub line: u32,
    /// The node this call occurs within, used to bind mitigations found at
    /// this call site back into the CFG's path analysis.
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub statements: Vec<String>,
    pub line_start: u32,
    pub line_end: u32,
    pub tainted_vars: HashSet<String>,
    pub mitigations: Vec<usize>,
    pub is_async_boundary: bool,
}

#[derive(Debug, Clone)]
pub struct CfgEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default)]
pub struct Cfg {
    pub function_name: String,
    pub nodes: Vec<CfgNode>,
    pub edges: Vec<CfgEdge>,
    pub entry: NodeId,
    pub exit: NodeId,
    pub call_sites: Vec<CallSite>,
    pub is_async: bool,
}

impl Cfg {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, kind: NodeKind, line_start: u32, line_end: u32) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(CfgNode {
            id,
            kind,
            statements: Vec::new(),
            line_start,
            line_end,
            tainted_vars: HashSet::new(),
            mitigations: Vec::new(),
            is_async_boundary: kind == NodeKind::Await,
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.edges.push(CfgEdge { from, to, kind });
    }

    pub fn successors(&self, node: NodeId) -> Vec<(NodeId, EdgeKind)> {
        self.edges
            .iter()
            .filter(|e| e.from == node)
            .map(|e| (e.to, e.kind))
            .collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut CfgNode> {
        self.nodes.get_mut(id)
    }
}
