//! Creating and computing generic fixpoint computations.
//!
//! A fixpoint problem is a directed graph together with
//! a value domain forming a partially ordered set:
//! every node carries a value
//! and every edge prescribes how the value at its start node
//! translates into a contribution to the value at its end node.
//! A solution assigns values to all nodes such that
//! for every edge the translated start value is subsumed by the end value.
//! The algorithm computes the least such solution
//! that still subsumes the manually set starting values.
//!
//! Edges, not nodes, carry transfer functions.
//! A transfer function may return `None`
//! to signal that nothing flows over the edge for the given input,
//! which keeps values of unreachable code out of the solution.
//!
//! ## Usage
//!
//! Implement [`FixpointProblem`] for a type holding the graph and whatever
//! context the transfer functions need. Then
//!
//! ```ignore
//! let mut computation = Computation::new(problem, None);
//! computation.set_value(start_node, start_value);
//! computation.compute();
//! let result = computation.value_of(some_node);
//! ```
//!
//! Worklist processing prefers nodes that come early
//! in a weak topological order of the graph,
//! so that loop bodies stabilize before their successors are visited.

use super::CancellationFlag;
use fnv::FnvHashMap;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeSet;

/// The description of a fixpoint problem:
/// the graph to run on, the value domain and the edge transfer functions.
///
/// All methods take `&self`,
/// so arbitrary context information can be made accessible to the
/// transfer functions through the implementing type.
pub trait FixpointProblem {
    /// The edge labels of the underlying graph.
    type EdgeLabel: Clone;
    /// The node labels of the underlying graph.
    type NodeLabel;
    /// The values assigned to nodes. The values should form
    /// a partially ordered set with [`merge`](Self::merge) as join.
    type Value: PartialEq + Eq + Clone;

    /// The graph on which the fixpoint computation runs.
    fn graph(&self) -> &DiGraph<Self::NodeLabel, Self::EdgeLabel>;

    /// Compute the join of two values.
    fn merge(&self, value1: &Self::Value, value2: &Self::Value) -> Self::Value;

    /// Translate the value at the start node of an edge
    /// into its contribution to the end node.
    /// `None` means that nothing flows over the edge.
    fn transfer_edge(&self, value: &Self::Value, edge: EdgeIndex) -> Option<Self::Value>;
}

/// The state of a (possibly partial) fixpoint computation:
/// the current node values and the worklist of nodes
/// whose outgoing edges still need processing.
pub struct Computation<P: FixpointProblem> {
    problem: P,
    /// The priority of each node, indexed by `NodeIndex::index`.
    /// Nodes with higher priority get stabilized first.
    priorities: Vec<usize>,
    /// The node of each priority.
    nodes_by_priority: Vec<NodeIndex>,
    /// The priorities (not node indices) of all nodes
    /// that are not known to be stabilized.
    worklist: BTreeSet<usize>,
    /// All currently known node values.
    values: FnvHashMap<NodeIndex, P::Value>,
}

impl<P: FixpointProblem> Computation<P> {
    /// Create a computation for the given problem.
    ///
    /// If a default value is given, every node starts out with it
    /// and is marked as not stabilized.
    /// Otherwise only nodes that get values
    /// through [`set_value`](Self::set_value) take part in the computation.
    pub fn new(problem: P, default_value: Option<P::Value>) -> Computation<P> {
        // Reverse order of the strongly connected components,
        // i.e. sources of the condensed graph get the highest priority.
        let nodes_by_priority: Vec<NodeIndex> = petgraph::algo::kosaraju_scc(problem.graph())
            .into_iter()
            .flatten()
            .collect();
        let mut priorities = vec![0; problem.graph().node_count()];
        for (priority, node) in nodes_by_priority.iter().enumerate() {
            priorities[node.index()] = priority;
        }
        let mut worklist = BTreeSet::new();
        let mut values = FnvHashMap::default();
        if let Some(default) = default_value {
            for (priority, node) in nodes_by_priority.iter().enumerate() {
                worklist.insert(priority);
                values.insert(*node, default.clone());
            }
        }
        Computation {
            problem,
            priorities,
            nodes_by_priority,
            worklist,
            values,
        }
    }

    /// The current value of a node.
    pub fn value_of(&self, node: NodeIndex) -> Option<&P::Value> {
        self.values.get(&node)
    }

    /// Set the value of a node and mark the node as not stabilized.
    pub fn set_value(&mut self, node: NodeIndex, value: P::Value) {
        self.values.insert(node, value);
        self.worklist.insert(self.priorities[node.index()]);
    }

    /// Join a new value into the value of a node.
    /// The node is marked as not stabilized if its value grew.
    fn merge_value(&mut self, node: NodeIndex, value: P::Value) {
        match self.values.get(&node) {
            Some(old_value) => {
                let merged = self.problem.merge(&value, old_value);
                if merged != *old_value {
                    self.set_value(node, merged);
                }
            }
            None => self.set_value(node, value),
        }
    }

    /// Propagate the value at the start node of an edge to its end node.
    fn update_edge(&mut self, edge: EdgeIndex) {
        let Some((start, end)) = self.problem.graph().edge_endpoints(edge) else {
            return;
        };
        if let Some(start_value) = self.values.get(&start) {
            if let Some(end_value) = self.problem.transfer_edge(start_value, edge) {
                self.merge_value(end, end_value);
            }
        }
    }

    /// Process all outgoing edges of a node.
    fn update_node(&mut self, node: NodeIndex) {
        let edges: Vec<EdgeIndex> = self
            .problem
            .graph()
            .edges(node)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.update_edge(edge);
        }
    }

    /// Take the node with the highest priority off the worklist.
    fn pop_worklist(&mut self) -> Option<NodeIndex> {
        let priority = *self.worklist.iter().next_back()?;
        self.worklist.remove(&priority);
        Some(self.nodes_by_priority[priority])
    }

    /// Run the worklist algorithm until a fixpoint is reached.
    ///
    /// Does not terminate if the problem has no fixpoint
    /// above the starting values,
    /// e.g. for strictly increasing values on a graph cycle.
    pub fn compute(&mut self) {
        while let Some(node) = self.pop_worklist() {
            self.update_node(node);
        }
    }

    /// Run the worklist algorithm, but visit each node at most `max_steps`
    /// times. Nodes that did not stabilize within their step budget remain
    /// on the worklist and [`has_stabilized`](Self::has_stabilized)
    /// returns `false`.
    pub fn compute_with_max_steps(&mut self, max_steps: u64) {
        let mut steps = vec![0; self.problem.graph().node_count()];
        let mut out_of_budget = BTreeSet::new();
        while let Some(node) = self.pop_worklist() {
            if steps[node.index()] < max_steps {
                steps[node.index()] += 1;
                self.update_node(node);
            } else {
                out_of_budget.insert(self.priorities[node.index()]);
            }
        }
        self.worklist = out_of_budget;
    }

    /// Run the worklist algorithm until a fixpoint is reached
    /// or cancellation is requested through the given flag.
    ///
    /// On cancellation the worklist keeps all unprocessed nodes,
    /// so a later call on the same computation resumes
    /// instead of starting over.
    pub fn compute_interruptible(&mut self, cancellation: &CancellationFlag) {
        while !cancellation.is_cancelled() {
            match self.pop_worklist() {
                Some(node) => self.update_node(node),
                None => return,
            }
        }
    }

    /// The current values of all nodes that have one.
    pub fn values(&self) -> &FnvHashMap<NodeIndex, P::Value> {
        &self.values
    }

    /// The graph on which the computation runs.
    pub fn graph(&self) -> &DiGraph<P::NodeLabel, P::EdgeLabel> {
        self.problem.graph()
    }

    /// The problem description the computation was created with.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Return `true` if the computed values are a fixpoint,
    /// i.e. if the worklist is empty.
    pub fn has_stabilized(&self) -> bool {
        self.worklist.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Values are earliest arrival times,
    /// edges are connections with a fixed duration.
    struct ArrivalProblem {
        graph: DiGraph<(), u64>,
    }

    impl FixpointProblem for ArrivalProblem {
        type EdgeLabel = u64;
        type NodeLabel = ();
        type Value = u64;

        fn graph(&self) -> &DiGraph<(), u64> {
            &self.graph
        }

        fn merge(&self, value1: &u64, value2: &u64) -> u64 {
            std::cmp::min(*value1, *value2)
        }

        fn transfer_edge(&self, value: &u64, edge: EdgeIndex) -> Option<u64> {
            let duration = self.graph.edge_weight(edge).unwrap();
            // Connections with duration zero are closed.
            if *duration == 0 {
                None
            } else {
                Some(value + duration)
            }
        }
    }

    fn diamond_with_shortcut() -> DiGraph<(), u64> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..5).map(|_| graph.add_node(())).collect();
        graph.add_edge(nodes[0], nodes[1], 10);
        graph.add_edge(nodes[0], nodes[2], 2);
        graph.add_edge(nodes[1], nodes[3], 1);
        graph.add_edge(nodes[2], nodes[3], 3);
        graph.add_edge(nodes[3], nodes[4], 0);
        graph
    }

    #[test]
    fn earliest_arrival_takes_the_fast_route() {
        let mut computation = Computation::new(
            ArrivalProblem {
                graph: diamond_with_shortcut(),
            },
            None,
        );
        computation.set_value(NodeIndex::new(0), 0);
        computation.compute();

        assert!(computation.has_stabilized());
        // Route over node 2 beats the route over node 1.
        assert_eq!(computation.value_of(NodeIndex::new(3)), Some(&5));
        // The closed connection propagates nothing.
        assert_eq!(computation.value_of(NodeIndex::new(4)), None);
    }

    /// A non-monotone toy problem whose values shrink on every visit,
    /// so cycles stabilize very slowly.
    struct CountdownProblem {
        graph: DiGraph<(), u64>,
    }

    impl FixpointProblem for CountdownProblem {
        type EdgeLabel = u64;
        type NodeLabel = ();
        type Value = u64;

        fn graph(&self) -> &DiGraph<(), u64> {
            &self.graph
        }

        fn merge(&self, value1: &u64, value2: &u64) -> u64 {
            std::cmp::min(*value1, *value2)
        }

        fn transfer_edge(&self, value: &u64, edge: EdgeIndex) -> Option<u64> {
            Some(value.saturating_sub(*self.graph.edge_weight(edge).unwrap()))
        }
    }

    #[test]
    fn max_steps_leaves_unstable_nodes_on_the_worklist() {
        let mut graph = DiGraph::new();
        let first = graph.add_node(());
        let second = graph.add_node(());
        graph.add_edge(first, second, 1);
        graph.add_edge(second, first, 1);
        let mut computation = Computation::new(CountdownProblem { graph }, None);
        computation.set_value(first, 1000);
        // Reaching the fixpoint at zero takes about 500 visits per node.
        computation.compute_with_max_steps(10);
        assert!(!computation.has_stabilized());
    }

    #[test]
    fn cancellation_preserves_the_worklist_for_resumption() {
        let mut computation = Computation::new(
            ArrivalProblem {
                graph: diamond_with_shortcut(),
            },
            None,
        );
        computation.set_value(NodeIndex::new(0), 0);

        let cancelled = CancellationFlag::new();
        cancelled.cancel();
        computation.compute_interruptible(&cancelled);
        assert!(!computation.has_stabilized());

        computation.compute_interruptible(&CancellationFlag::new());
        assert!(computation.has_stabilized());
        assert_eq!(computation.value_of(NodeIndex::new(3)), Some(&5));
    }
}
