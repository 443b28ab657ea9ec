//! Generation of the interprocedural control flow graph (ICFG).
//!
//! The graph contains one node per statement of each defined function.
//! Nodes borrow their statement and function terms from the program,
//! so the graph is cheap to build and nodes are cheap to copy.
//!
//! ## Edge kinds
//!
//! - `Normal` edges represent intraprocedural control flow:
//!   fallthrough to the next statement and (conditional) jumps.
//! - `Call` edges lead from a call statement to the entry point of each
//!   resolved callee that has a body.
//! - `Return` edges lead from an exit statement of a callee back to the
//!   return site of a call, and remember the matching call node.
//! - `CallToReturn` edges bridge a call statement directly to its return
//!   site. They carry the effects on state untouched by the callee
//!   and they are the only outgoing edge of calls
//!   without resolvable callees or with only external callees.
//!
//! The return site of a call is its fallthrough successor.
//! Interprocedural analyses dispatch on the edge kind;
//! the successor and predecessor queries on this type stay intraprocedural,
//! i.e. they follow only `Normal` and `CallToReturn` edges.
//!
//! ## Granularity
//!
//! One statement per node keeps flow and edge functions maximally local.
//! Basic-block grouping would shrink the graph
//! but complicate every client of the node type for no semantic gain.

use super::callgraph::CallGraph;
use crate::intermediate_representation::*;
use fnv::FnvHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// The node type of the ICFG: a statement together with the function
/// containing it.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct CfgNode<'a> {
    /// The statement the node represents.
    pub stmt: &'a Term<Stmt>,
    /// The function containing the statement.
    pub function: &'a Term<Function>,
}

impl std::fmt::Display for CfgNode<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "{} @ {}::{}",
            self.stmt.term, self.function.term.name, self.stmt.tid
        )
    }
}

/// The edge type of the ICFG.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum CfgEdge {
    /// Intraprocedural control flow.
    Normal,
    /// From a call statement to the entry point of a resolved callee.
    Call,
    /// From an exit statement of a callee back to the return site
    /// of the call node recorded in the edge.
    Return {
        /// The call node this return edge belongs to.
        call: NodeIndex,
    },
    /// From a call statement directly to its return site.
    CallToReturn,
}

/// The graph type of the ICFG.
pub type CfgGraph<'a> = DiGraph<CfgNode<'a>, CfgEdge>;

/// The interprocedural control flow graph of a program,
/// together with index structures for the queries of dataflow solvers.
pub struct Cfg<'a> {
    graph: CfgGraph<'a>,
    /// The node of each statement.
    nodes: FnvHashMap<Tid, NodeIndex>,
    /// The entry node of each defined function.
    entries: FnvHashMap<Tid, NodeIndex>,
    /// The exit nodes of each defined function.
    exits: FnvHashMap<Tid, Vec<NodeIndex>>,
    /// All statement nodes of each defined function, in body order.
    statement_nodes: FnvHashMap<Tid, Vec<NodeIndex>>,
    /// All defined functions, in program order.
    functions: Vec<&'a Term<Function>>,
}

impl<'a> Cfg<'a> {
    /// Build the ICFG of a program.
    /// Interprocedural edges follow the given call graph.
    ///
    /// Panics if the program is malformed,
    /// i.e. if statement identifiers collide or a jump target does not exist.
    pub fn build(program: &'a Program, call_graph: &CallGraph) -> Cfg<'a> {
        let mut graph = DiGraph::new();
        let mut nodes = FnvHashMap::default();
        let mut entries = FnvHashMap::default();
        let mut exits: FnvHashMap<Tid, Vec<NodeIndex>> = FnvHashMap::default();
        let mut statement_nodes: FnvHashMap<Tid, Vec<NodeIndex>> = FnvHashMap::default();
        let mut functions = Vec::new();

        for function in program.functions.iter().filter(|function| !function.term.is_external()) {
            functions.push(function);
            for (index, stmt) in function.term.statements.iter().enumerate() {
                let node = graph.add_node(CfgNode { stmt, function });
                if nodes.insert(stmt.tid.clone(), node).is_some() {
                    panic!("Malformed program: duplicate statement identifier {}.", stmt.tid);
                }
                if index == 0 {
                    entries.insert(function.tid.clone(), node);
                }
                if stmt.term.is_return() {
                    exits.entry(function.tid.clone()).or_default().push(node);
                }
                statement_nodes.entry(function.tid.clone()).or_default().push(node);
            }
        }

        // Intraprocedural edges.
        for function in &functions {
            let stmts = &function.term.statements;
            for (index, stmt) in stmts.iter().enumerate() {
                let node = nodes[&stmt.tid];
                let fallthrough = stmts.get(index + 1).map(|next| nodes[&next.tid]);
                match &stmt.term {
                    Stmt::Jump { target } => {
                        graph.add_edge(node, jump_target(&nodes, target), CfgEdge::Normal);
                    }
                    Stmt::CondJump { if_true, .. } => {
                        graph.add_edge(node, jump_target(&nodes, if_true), CfgEdge::Normal);
                        if let Some(next) = fallthrough {
                            graph.add_edge(node, next, CfgEdge::Normal);
                        }
                    }
                    Stmt::Call { .. } => {
                        if let Some(next) = fallthrough {
                            graph.add_edge(node, next, CfgEdge::CallToReturn);
                        }
                    }
                    Stmt::Return { .. } => (),
                    Stmt::Assign { .. } | Stmt::New { .. } | Stmt::Nop => {
                        if let Some(next) = fallthrough {
                            graph.add_edge(node, next, CfgEdge::Normal);
                        }
                    }
                }
            }
        }

        // Interprocedural edges for calls with resolved, defined callees.
        for function in &functions {
            for call in function.term.call_sites() {
                let call_node = nodes[&call.tid];
                let return_site = graph
                    .edges(call_node)
                    .find(|edge| *edge.weight() == CfgEdge::CallToReturn)
                    .map(|edge| edge.target());
                for callee_tid in call_graph.callees_of(&call.tid) {
                    let Some(entry) = entries.get(&callee_tid) else {
                        // External callee, the call-to-return edge models it.
                        continue;
                    };
                    graph.add_edge(call_node, *entry, CfgEdge::Call);
                    if let Some(return_site) = return_site {
                        for &exit in exits.get(&callee_tid).into_iter().flatten() {
                            graph.add_edge(exit, return_site, CfgEdge::Return { call: call_node });
                        }
                    }
                }
            }
        }

        Cfg {
            graph,
            nodes,
            entries,
            exits,
            statement_nodes,
            functions,
        }
    }

    /// The underlying graph.
    pub fn graph(&self) -> &CfgGraph<'a> {
        &self.graph
    }

    /// The node of the statement with the given term identifier.
    pub fn node_of(&self, stmt: &Tid) -> Option<NodeIndex> {
        self.nodes.get(stmt).copied()
    }

    /// The statement a node represents.
    pub fn stmt(&self, node: NodeIndex) -> &'a Term<Stmt> {
        self.graph[node].stmt
    }

    /// The function containing the statement of a node.
    pub fn function_of(&self, node: NodeIndex) -> &'a Term<Function> {
        self.graph[node].function
    }

    /// The intraprocedural successors of a node.
    /// For call statements these are the return sites.
    pub fn successors_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges(node)
            .filter(|edge| matches!(edge.weight(), CfgEdge::Normal | CfgEdge::CallToReturn))
            .map(|edge| edge.target())
            .collect()
    }

    /// The intraprocedural predecessors of a node.
    pub fn predecessors_of(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .filter(|edge| matches!(edge.weight(), CfgEdge::Normal | CfgEdge::CallToReturn))
            .map(|edge| edge.source())
            .collect()
    }

    /// Return `true` if the node represents a call statement.
    pub fn is_call_site(&self, node: NodeIndex) -> bool {
        self.stmt(node).term.is_call()
    }

    /// Return `true` if the node represents an exit statement of its function.
    pub fn is_exit_statement(&self, node: NodeIndex) -> bool {
        self.stmt(node).term.is_return()
    }

    /// Return `true` if the node is the entry point of its function.
    pub fn is_start_point(&self, node: NodeIndex) -> bool {
        self.entries.get(&self.function_of(node).tid) == Some(&node)
    }

    /// The resolved callees with a body of a call node.
    /// Empty for unresolved calls, calls to external functions
    /// and nodes that are not calls.
    pub fn callees_of_call_at(&self, node: NodeIndex) -> Vec<&'a Term<Function>> {
        self.graph
            .edges(node)
            .filter(|edge| *edge.weight() == CfgEdge::Call)
            .map(|edge| self.function_of(edge.target()))
            .collect()
    }

    /// The return sites of a call node.
    pub fn return_sites_of_call_at(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges(node)
            .filter(|edge| *edge.weight() == CfgEdge::CallToReturn)
            .map(|edge| edge.target())
            .collect()
    }

    /// All `(call, return site)` pairs that the given exit statement
    /// returns to.
    pub fn return_edges_of_exit(&self, exit: NodeIndex) -> Vec<(NodeIndex, NodeIndex)> {
        self.graph
            .edges(exit)
            .filter_map(|edge| match edge.weight() {
                CfgEdge::Return { call } => Some((*call, edge.target())),
                _ => None,
            })
            .collect()
    }

    /// The start points of a function. Empty for external functions.
    pub fn start_points_of(&self, function: &Tid) -> Vec<NodeIndex> {
        self.entries.get(function).copied().into_iter().collect()
    }

    /// The exit statements of a function.
    pub fn exit_points_of(&self, function: &Tid) -> Vec<NodeIndex> {
        self.exits.get(function).cloned().unwrap_or_default()
    }

    /// All call nodes with a call edge into the given function.
    pub fn callers_of(&self, function: &Tid) -> Vec<NodeIndex> {
        let Some(&entry) = self.entries.get(function) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(entry, Direction::Incoming)
            .filter(|edge| *edge.weight() == CfgEdge::Call)
            .map(|edge| edge.source())
            .collect()
    }

    /// All call nodes inside the given function.
    pub fn calls_from_within(&self, function: &Tid) -> Vec<NodeIndex> {
        self.statement_nodes
            .get(function)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&node| self.is_call_site(node))
            .collect()
    }

    /// All defined functions of the program, in program order.
    pub fn all_functions(&self) -> impl Iterator<Item = &'a Term<Function>> + '_ {
        self.functions.iter().copied()
    }

    /// All nodes that are neither call statements nor function entry points.
    pub fn all_non_call_start_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&node| !self.is_call_site(node) && !self.is_start_point(node))
            .collect()
    }

    /// The number of statement nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// The node of a jump target.
/// Panics if the program jumps to an unknown statement.
fn jump_target(nodes: &FnvHashMap<Tid, NodeIndex>, target: &Tid) -> NodeIndex {
    match nodes.get(target) {
        Some(&node) => node,
        None => panic!("Malformed program: jump to unknown statement {target}."),
    }
}

#[cfg(test)]
mod tests {
    use super::super::callgraph::resolver::ClassHierarchyResolver;
    use super::*;

    fn build_cfg(program: &Program) -> Cfg<'_> {
        let call_graph = CallGraph::build(program, &mut ClassHierarchyResolver);
        Cfg::build(program, &call_graph)
    }

    #[test]
    fn straight_line_flow_and_branching() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_cond_jump("branch", Expression::Var(Variable::new("c")), "exit"),
                Stmt::mock_assign("then", "x", Expression::Const(1)),
                Stmt::mock_return("exit", None),
            ],
        )]);
        let cfg = build_cfg(&program);
        let branch = cfg.node_of(&Tid::new("branch")).unwrap();
        let then = cfg.node_of(&Tid::new("then")).unwrap();
        let exit = cfg.node_of(&Tid::new("exit")).unwrap();

        let mut successors = cfg.successors_of(branch);
        successors.sort();
        let mut expected = vec![then, exit];
        expected.sort();
        assert_eq!(successors, expected);

        assert_eq!(cfg.predecessors_of(exit).len(), 2);
        assert!(cfg.is_start_point(branch));
        assert!(cfg.is_exit_statement(exit));
        assert_eq!(cfg.exit_points_of(&Tid::new("fn_main")), vec![exit]);
        assert_eq!(cfg.all_non_call_start_nodes(), vec![then, exit]);
    }

    #[test]
    fn resolved_calls_are_wired_interprocedurally() {
        let program = Program::mock(vec![
            Function::mock_with_stmts(
                "main",
                &[],
                vec![
                    Stmt::mock_call("call", "callee", Vec::new(), None),
                    Stmt::mock_return("ret", None),
                ],
            ),
            Function::mock_with_stmts(
                "callee",
                &[],
                vec![Stmt::mock_return("callee_ret", None)],
            ),
        ]);
        let cfg = build_cfg(&program);
        let call = cfg.node_of(&Tid::new("call")).unwrap();
        let ret = cfg.node_of(&Tid::new("ret")).unwrap();
        let callee_entry = cfg.node_of(&Tid::new("callee_ret")).unwrap();

        assert!(cfg.is_call_site(call));
        assert_eq!(cfg.return_sites_of_call_at(call), vec![ret]);
        // Intraprocedural successor of the call is its return site.
        assert_eq!(cfg.successors_of(call), vec![ret]);
        let callees = cfg.callees_of_call_at(call);
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].term.name, "callee");
        assert_eq!(cfg.start_points_of(&Tid::new("fn_callee")), vec![callee_entry]);
        assert_eq!(cfg.return_edges_of_exit(callee_entry), vec![(call, ret)]);
        assert_eq!(cfg.callers_of(&Tid::new("fn_callee")), vec![call]);
        assert_eq!(cfg.calls_from_within(&Tid::new("fn_main")), vec![call]);
    }

    #[test]
    fn unresolved_indirect_calls_degrade_to_call_to_return() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_call_indirect(
                    "call",
                    Expression::Var(Variable::new("fptr")),
                    Vec::new(),
                    None,
                ),
                Stmt::mock_return("ret", None),
            ],
        )]);
        let cfg = build_cfg(&program);
        let call = cfg.node_of(&Tid::new("call")).unwrap();
        let ret = cfg.node_of(&Tid::new("ret")).unwrap();

        assert!(cfg.callees_of_call_at(call).is_empty());
        assert_eq!(cfg.return_sites_of_call_at(call), vec![ret]);
        assert_eq!(cfg.successors_of(call), vec![ret]);
    }

    #[test]
    fn calls_to_external_functions_stay_intraprocedural() {
        let program = Program::mock(vec![
            Function::mock("malloc", &["size"]),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![
                    Stmt::mock_call("call", "malloc", vec![Expression::Const(8)], Some("p")),
                    Stmt::mock_return("ret", None),
                ],
            ),
        ]);
        let cfg = build_cfg(&program);
        let call = cfg.node_of(&Tid::new("call")).unwrap();

        // The call graph knows the external callee,
        // but there is no body to descend into.
        assert!(cfg.callees_of_call_at(call).is_empty());
        assert_eq!(cfg.successors_of(call).len(), 1);
        assert_eq!(cfg.all_functions().count(), 1);
    }
}
