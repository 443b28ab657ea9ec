//! The value table produced by a completed solve.

use crate::utils::table::Table;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;

/// A read-only view of the computed values of an IDE solve:
/// for each node of the ICFG the lattice value of every fact that reached it.
///
/// Fact/value pairs missing from the table were never reached;
/// their value is the top element of the lattice.
#[derive(Clone, Copy)]
pub struct SolverResults<'s, D: Ord, V> {
    values: &'s Table<NodeIndex, D, V>,
}

impl<'s, D: Ord, V> SolverResults<'s, D, V> {
    pub(super) fn new(values: &'s Table<NodeIndex, D, V>) -> SolverResults<'s, D, V> {
        SolverResults { values }
    }

    /// The values of all facts that reached the given node,
    /// ordered by fact.
    pub fn results_at(&self, node: NodeIndex) -> Option<&'s BTreeMap<D, V>> {
        self.values.row(&node)
    }

    /// The value of a single fact at the given node.
    /// `None` means the fact never reached the node
    /// and its value is the top element.
    pub fn result_at(&self, node: NodeIndex, fact: &D) -> Option<&'s V> {
        self.values.get(&node, fact)
    }

    /// Iterate over all `(node, fact, value)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &'s D, &'s V)> {
        self.values
            .iter()
            .map(|(node, fact, value)| (*node, fact, value))
    }

    /// The number of `(node, fact)` pairs with a computed value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return `true` if no values were computed.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
