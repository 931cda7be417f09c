//! CFG construction from a tree-sitter AST. Walks each
//! function-like construct with a recursive-descent lowering, mirroring the
//! `child_by_field_name` + `TreeCursor` walking idiom used for symbol
//! extraction elsewhere in the corpus.

use crate::cfa::cfg::{Cfg, EdgeKind, NodeId, NodeKind};
use crate::cfa::parser::{node_line, node_line_end, node_text, SourceLanguage};
use tree_sitter::{Node, Tree};

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function",
    "function_expression",
    "arrow_function",
    "method_definition",
];

/// Discovers every function-like node in the tree and builds one `Cfg` per
/// function. Nested functions get their own independent CFG.
pub fn build_cfgs(tree: &Tree, source: &str, _language: SourceLanguage) -> Vec<Cfg> {
    let mut cfgs = Vec::new();
    let mut cursor = tree.root_node().walk();
    collect_functions(&mut cursor, source, &mut cfgs);
    resolve_call_sites(&mut cfgs);
    cfgs
}

/// Marks each non-dynamic call site as `resolved` when its callee name
/// matches a function defined elsewhere in this same file.
fn resolve_call_sites(cfgs: &mut [Cfg]) {
    let known: std::collections::HashSet<String> =
        cfgs.iter().map(|c| c.function_name.clone()).collect();
    for cfg in cfgs {
        for call in &mut cfg.call_sites {
            call.resolved = !call.dynamic && known.contains(&call.callee_name);
        }
    }
}

fn collect_functions(cursor: &mut tree_sitter::TreeCursor, source: &str, out: &mut Vec<Cfg>) {
    loop {
        let node = cursor.node();
        if FUNCTION_KINDS.contains(&node.kind()) {
            out.push(build_function_cfg(node, source));
        }
        if cursor.goto_first_child() {
            collect_functions(cursor, source, out);
            cursor.goto_parent();
        }
        if !cursor.goto_next_sibling() {
            break;
        }
    }
}

fn function_name(node: Node, source: &str) -> String {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_else(|| format!("anonymous@{}", node_line(node)))
}

struct Builder<'a> {
    cfg: Cfg,
    source: &'a str,
}

impl<'a> Builder<'a> {
    /// Lowers `node` (a statement or block) starting from `current`,
    /// returning the node flow continues from, or `None` if the statement
    /// terminates the function (return/throw).
    fn lower_block(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        let mut cur = Some(current);
        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            let Some(c) = cur else { return None };
            cur = self.lower_statement(child, c);
        }
        cur
    }

    fn lower_statement(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        match node.kind() {
            "if_statement" => self.lower_if(node, current),
            "for_statement" | "for_in_statement" | "for_of_statement" => {
                self.lower_loop(node, current)
            }
            "while_statement" => self.lower_loop(node, current),
            "do_statement" => self.lower_do_while(node, current),
            "switch_statement" => self.lower_switch(node, current),
            "try_statement" => self.lower_try(node, current),
            "return_statement" => {
                self.collect_calls_and_awaits(node, current);
                let exit = self.cfg.add_node(NodeKind::Exit, node_line(node), node_line_end(node));
                self.cfg.add_edge(current, exit, EdgeKind::Return);
                None
            }
            "throw_statement" => {
                self.collect_calls_and_awaits(node, current);
                let exit = self.cfg.add_node(NodeKind::Throw, node_line(node), node_line_end(node));
                self.cfg.add_edge(current, exit, EdgeKind::Exception);
                None
            }
            "statement_block" => self.lower_block(node, current),
            "expression_statement" | "lexical_declaration" | "variable_declaration" => {
                self.collect_calls_and_awaits(node, current);
                if contains_await(node) {
                    let await_node = self.cfg.add_node(NodeKind::Await, node_line(node), node_line_end(node));
                    self.cfg.add_edge(current, await_node, EdgeKind::Await);
                    Some(await_node)
                } else {
                    if let Some(n) = self.cfg.node_mut(current) {
                        n.statements.push(node_text(node, self.source).to_string());
                    }
                    Some(current)
                }
            }
            _ => Some(current),
        }
    }

    fn lower_if(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        let branch = self.cfg.add_node(NodeKind::Branch, node_line(node), node_line(node));
        self.cfg.add_edge(current, branch, EdgeKind::Sequential);
        let merge = self.cfg.add_node(NodeKind::Merge, node_line_end(node), node_line_end(node));

        if let Some(consequence) = node.child_by_field_name("consequence") {
            let true_entry = self.cfg.add_node(NodeKind::Basic, node_line(consequence), node_line_end(consequence));
            self.cfg.add_edge(branch, true_entry, EdgeKind::BranchTrue);
            if let Some(end) = self.lower_statement(consequence, true_entry) {
                self.cfg.add_edge(end, merge, EdgeKind::Sequential);
            }
        }

        if let Some(alt) = node.child_by_field_name("alternative") {
            let false_entry = self.cfg.add_node(NodeKind::Basic, node_line(alt), node_line_end(alt));
            self.cfg.add_edge(branch, false_entry, EdgeKind::BranchFalse);
            if let Some(end) = self.lower_statement(alt, false_entry) {
                self.cfg.add_edge(end, merge, EdgeKind::Sequential);
            }
        } else {
            self.cfg.add_edge(branch, merge, EdgeKind::BranchFalse);
        }

        Some(merge)
    }

    fn lower_loop(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        let header = self.cfg.add_node(NodeKind::LoopHeader, node_line(node), node_line(node));
        self.cfg.add_edge(current, header, EdgeKind::Sequential);
        let exit = self.cfg.add_node(NodeKind::Merge, node_line_end(node), node_line_end(node));

        let body_node = node.child_by_field_name("body");
        let body_entry = self.cfg.add_node(NodeKind::LoopBody, node_line(node), node_line_end(node));
        self.cfg.add_edge(header, body_entry, EdgeKind::BranchTrue);
        self.cfg.add_edge(header, exit, EdgeKind::LoopExit);

        if let Some(body) = body_node {
            if let Some(end) = self.lower_statement(body, body_entry) {
                self.cfg.add_edge(end, header, EdgeKind::LoopBack);
            }
        } else {
            self.cfg.add_edge(body_entry, header, EdgeKind::LoopBack);
        }

        Some(exit)
    }

    fn lower_do_while(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        // body executes before the condition is first tested.
        let body_entry = self.cfg.add_node(NodeKind::LoopBody, node_line(node), node_line_end(node));
        self.cfg.add_edge(current, body_entry, EdgeKind::Sequential);
        let header = self.cfg.add_node(NodeKind::LoopHeader, node_line(node), node_line(node));
        let exit = self.cfg.add_node(NodeKind::Merge, node_line_end(node), node_line_end(node));

        let body_exit = if let Some(body) = node.child_by_field_name("body") {
            self.lower_statement(body, body_entry)
        } else {
            Some(body_entry)
        };
        if let Some(be) = body_exit {
            self.cfg.add_edge(be, header, EdgeKind::Sequential);
        }
        self.cfg.add_edge(header, body_entry, EdgeKind::LoopBack);
        self.cfg.add_edge(header, exit, EdgeKind::LoopExit);
        Some(exit)
    }

    fn lower_switch(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        let branch = self.cfg.add_node(NodeKind::Branch, node_line(node), node_line(node));
        self.cfg.add_edge(current, branch, EdgeKind::Sequential);
        let merge = self.cfg.add_node(NodeKind::Merge, node_line_end(node), node_line_end(node));

        let mut has_default = false;
        let mut prev_case_exit: Option<NodeId> = None;
        let mut walker = node.walk();
        for case in node.children(&mut walker) {
            if case.kind() != "switch_case" && case.kind() != "switch_default" {
                continue;
            }
            if case.kind() == "switch_default" {
                has_default = true;
            }
            let case_entry = self.cfg.add_node(NodeKind::Basic, node_line(case), node_line_end(case));
            self.cfg.add_edge(branch, case_entry, EdgeKind::BranchTrue);
            // Fall-through: the previous case's exit also reaches this case.
            if let Some(prev) = prev_case_exit {
                self.cfg.add_edge(prev, case_entry, EdgeKind::Sequential);
            }
            let case_exit = self.lower_block(case, case_entry);
            if let Some(exit) = case_exit {
                self.cfg.add_edge(exit, merge, EdgeKind::Sequential);
            }
            prev_case_exit = case_exit;
        }

        if !has_default {
            self.cfg.add_edge(branch, merge, EdgeKind::BranchFalse);
        }
        Some(merge)
    }

    fn lower_try(&mut self, node: Node<'a>, current: NodeId) -> Option<NodeId> {
        let merge = self.cfg.add_node(NodeKind::Merge, node_line_end(node), node_line_end(node));

        let try_entry = self.cfg.add_node(NodeKind::Basic, node_line(node), node_line_end(node));
        self.cfg.add_edge(current, try_entry, EdgeKind::Sequential);
        let try_exit = node
            .child_by_field_name("body")
            .and_then(|b| self.lower_statement(b, try_entry));

        let catch = node.child_by_field_name("handler");
        let catch_exit = if let Some(catch_clause) = catch {
            let catch_entry = self.cfg.add_node(NodeKind::Basic, node_line(catch_clause), node_line_end(catch_clause));
            self.cfg.add_edge(try_entry, catch_entry, EdgeKind::Exception);
            self.lower_statement(catch_clause, catch_entry)
        } else {
            None
        };

        let finally = node.child_by_field_name("finalizer");
        if let Some(finally_clause) = finally {
            let finally_entry = self.cfg.add_node(NodeKind::Basic, node_line(finally_clause), node_line_end(finally_clause));
            if let Some(te) = try_exit {
                self.cfg.add_edge(te, finally_entry, EdgeKind::Sequential);
            }
            if let Some(ce) = catch_exit {
                self.cfg.add_edge(ce, finally_entry, EdgeKind::Sequential);
            }
            if let Some(end) = self.lower_statement(finally_clause, finally_entry) {
                self.cfg.add_edge(end, merge, EdgeKind::Sequential);
            }
        } else {
            if let Some(te) = try_exit {
                self.cfg.add_edge(te, merge, EdgeKind::Sequential);
            }
            if let Some(ce) = catch_exit {
                self.cfg.add_edge(ce, merge, EdgeKind::Sequential);
            }
        }

        Some(merge)
    }

    fn collect_calls_and_awaits(&mut self, node: Node<'a>, current: NodeId) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if n.kind() == "call_expression" {
                let callee = n
                    .child_by_field_name("function")
                    .map(|f| node_text(f, self.source).to_string())
                    .unwrap_or_default();
                let dynamic = callee.contains('[') || callee.is_empty();
                self.cfg.call_sites.push(crate::cfa::cfg::CallSite {
                    callee_name: callee,
                    resolved: false,
                    dynamic,
                    line: node_line(n),
                    node: current,
                });
            }
            if n.kind() == "await_expression" {
                if let Some(c) = self.cfg.node_mut(current) {
                    c.is_async_boundary = true;
                }
            }
            let mut walker = n.walk();
            for child in n.children(&mut walker) {
                stack.push(child);
            }
        }
    }
}

fn contains_await(node: Node) -> bool {
    if node.kind() == "await_expression" {
        return true;
    }
    let mut walker = node.walk();
    node.children(&mut walker).any(contains_await)
}

fn build_function_cfg(func_node: Node, source: &str) -> Cfg {
    let mut cfg = Cfg::new(function_name(func_node, source));
    cfg.is_async = node_text(func_node, source).trim_start().starts_with("async");
    let entry = cfg.add_node(NodeKind::Entry, node_line(func_node), node_line(func_node));
    cfg.entry = entry;
    let mut builder = Builder { cfg, source };

    let body = func_node.child_by_field_name("body");
    let last = body.and_then(|b| builder.lower_statement(b, entry));

    if let Some(end) = last {
        let exit = builder.cfg.add_node(NodeKind::Exit, node_line_end(func_node), node_line_end(func_node));
        builder.cfg.add_edge(end, exit, EdgeKind::Sequential);
        builder.cfg.exit = exit;
    } else {
        builder.cfg.exit = builder.cfg.entry;
    }

    builder.cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfa::parser::{parse, SourceLanguage};

    #[test]
    fn builds_branch_and_merge_for_if_else() {
        let source = "function f(x) { if (x) { doA(); } else { doB(); } return 1; }";
        let tree = parse(source, SourceLanguage::JavaScript).unwrap();
        let cfgs = build_cfgs(&tree, source, SourceLanguage::JavaScript);
        assert_eq!(cfgs.len(), 1);
        let cfg = &cfgs[0];
        assert!(cfg.nodes.iter().any(|n| n.kind == NodeKind::Branch));
        assert!(cfg.nodes.iter().any(|n| n.kind == NodeKind::Merge));
    }

    #[test]
    fn loop_has_back_edge_and_exit() {
        let source = "function f() { while (true) { doWork(); } }";
        let tree = parse(source, SourceLanguage::JavaScript).unwrap();
        let cfgs = build_cfgs(&tree, source, SourceLanguage::JavaScript);
        let cfg = &cfgs[0];
        assert!(cfg.edges.iter().any(|e| e.kind == EdgeKind::LoopBack));
        assert!(cfg.edges.iter().any(|e| e.kind == EdgeKind::LoopExit));
    }

    #[test]
    fn records_call_sites() {
        let source = "function f() { sanitize(x); db.query(x); }";
        let tree = parse(source, SourceLanguage::JavaScript).unwrap();
        let cfgs = build_cfgs(&tree, source, SourceLanguage::JavaScript);
        let cfg = &cfgs[0];
        assert!(cfg.call_sites.iter().any(|c| c.callee_name.contains("sanitize")));
    }
}
