//! The table of jump functions computed during Phase I of the solver.
//!
//! A jump function summarizes all paths of the exploded supergraph from a
//! fact `d1` at the start point of a function to a fact `d2` at a node `n`
//! inside the same function, as a single edge function.
//! The table is indexed both ways:
//! by `(d1, n)` for forward propagation
//! and by `(n, d2)` for the reverse lookups of call and exit processing.
//!
//! The constant-top function is the implicit value of every absent entry,
//! so storing it is a no-op. Both indices hold the functions in fact order,
//! which keeps iteration over the table deterministic.

use super::edge_function::{EdgeFunction, EdgeFunctionOps};
use crate::utils::table::Table;
use petgraph::graph::NodeIndex;
use std::collections::BTreeMap;

/// The jump functions of all node/fact pairs reached so far.
pub struct JumpFunctions<D: Ord + Clone, F: EdgeFunctionOps> {
    /// `n -> d1 -> (d2 -> function)`
    by_source: Table<NodeIndex, D, BTreeMap<D, EdgeFunction<F>>>,
    /// `n -> d2 -> (d1 -> function)`
    by_target: Table<NodeIndex, D, BTreeMap<D, EdgeFunction<F>>>,
}

impl<D: Ord + Clone, F: EdgeFunctionOps> JumpFunctions<D, F> {
    /// Create an empty table.
    pub fn new() -> JumpFunctions<D, F> {
        JumpFunctions {
            by_source: Table::new(),
            by_target: Table::new(),
        }
    }

    /// Record the jump function from `(start point, source_fact)`
    /// to `(target, target_fact)`, replacing any previous entry.
    ///
    /// The caller is responsible for joining with the previous entry first;
    /// this table only stores.
    /// Storing the constant-top function is a no-op
    /// since absent entries already mean constant-top.
    pub fn add_function(
        &mut self,
        source_fact: D,
        target: NodeIndex,
        target_fact: D,
        function: EdgeFunction<F>,
    ) {
        if function.is_all_top() {
            return;
        }
        self.by_source
            .row_mut(target)
            .entry(source_fact.clone())
            .or_default()
            .insert(target_fact.clone(), function.clone());
        self.by_target
            .row_mut(target)
            .entry(target_fact)
            .or_default()
            .insert(source_fact, function);
    }

    /// The stored jump function for the given triple, if any.
    pub fn function_of(
        &self,
        source_fact: &D,
        target: NodeIndex,
        target_fact: &D,
    ) -> Option<&EdgeFunction<F>> {
        self.by_source
            .get(&target, source_fact)
            .and_then(|targets| targets.get(target_fact))
    }

    /// All `target_fact -> function` entries
    /// for a source fact and a target node.
    pub fn forward_lookup(
        &self,
        source_fact: &D,
        target: NodeIndex,
    ) -> Option<&BTreeMap<D, EdgeFunction<F>>> {
        self.by_source.get(&target, source_fact)
    }

    /// All `source_fact -> function` entries
    /// for a target node and a fact at that node.
    pub fn reverse_lookup(
        &self,
        target: NodeIndex,
        target_fact: &D,
    ) -> Option<&BTreeMap<D, EdgeFunction<F>>> {
        self.by_target.get(&target, target_fact)
    }

    /// All `(source_fact, target_fact, function)` triples at a target node.
    pub fn lookup_by_target(
        &self,
        target: NodeIndex,
    ) -> impl Iterator<Item = (&D, &D, &EdgeFunction<F>)> {
        self.by_source
            .row(&target)
            .into_iter()
            .flatten()
            .flat_map(|(source_fact, targets)| {
                targets
                    .iter()
                    .map(move |(target_fact, function)| (source_fact, target_fact, function))
            })
    }

    /// Remove the entry for the given triple.
    /// Returns `true` if an entry was removed.
    pub fn remove_function(&mut self, source_fact: &D, target: NodeIndex, target_fact: &D) -> bool {
        let mut removed = false;
        if let Some(targets) = self.by_source.get_mut(&target, source_fact) {
            removed = targets.remove(target_fact).is_some();
            if targets.is_empty() {
                self.by_source.remove(&target, source_fact);
            }
        }
        if let Some(sources) = self.by_target.get_mut(&target, target_fact) {
            sources.remove(source_fact);
            if sources.is_empty() {
                self.by_target.remove(&target, target_fact);
            }
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.by_source.clear();
        self.by_target.clear();
    }

    /// The number of stored jump functions.
    pub fn count(&self) -> usize {
        self.by_source
            .iter()
            .map(|(_, _, targets)| targets.len())
            .sum()
    }
}

impl<D: Ord + Clone, F: EdgeFunctionOps> Default for JumpFunctions<D, F> {
    fn default() -> Self {
        JumpFunctions::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::edge_function::BinaryEdgeFunction;
    use super::*;

    type Functions = JumpFunctions<u32, BinaryEdgeFunction>;

    #[test]
    fn constant_top_entries_are_not_stored() {
        let mut jump_functions = Functions::new();
        jump_functions.add_function(0, NodeIndex::new(1), 2, EdgeFunction::AllTop);
        assert_eq!(jump_functions.count(), 0);
        assert!(jump_functions.forward_lookup(&0, NodeIndex::new(1)).is_none());
        assert!(jump_functions.reverse_lookup(NodeIndex::new(1), &2).is_none());
    }

    #[test]
    fn both_indices_stay_consistent() {
        let mut jump_functions = Functions::new();
        let node = NodeIndex::new(4);
        jump_functions.add_function(0, node, 1, EdgeFunction::Identity);
        jump_functions.add_function(0, node, 2, EdgeFunction::AllBottom);
        jump_functions.add_function(3, node, 1, EdgeFunction::Identity);

        assert_eq!(jump_functions.count(), 3);
        assert_eq!(
            jump_functions.forward_lookup(&0, node).map(|map| map.len()),
            Some(2)
        );
        let sources = jump_functions.reverse_lookup(node, &1).unwrap();
        assert_eq!(
            sources.keys().copied().collect::<Vec<u32>>(),
            vec![0, 3]
        );
        assert_eq!(
            jump_functions.function_of(&0, node, &2),
            Some(&EdgeFunction::AllBottom)
        );
        assert_eq!(jump_functions.lookup_by_target(node).count(), 3);

        // Replacement keeps one entry per triple.
        jump_functions.add_function(0, node, 1, EdgeFunction::AllBottom);
        assert_eq!(jump_functions.count(), 3);
        assert_eq!(
            jump_functions.function_of(&0, node, &1),
            Some(&EdgeFunction::AllBottom)
        );
    }

    #[test]
    fn removal_updates_both_indices() {
        let mut jump_functions = Functions::new();
        let node = NodeIndex::new(7);
        jump_functions.add_function(0, node, 1, EdgeFunction::Identity);
        assert!(jump_functions.remove_function(&0, node, &1));
        assert!(!jump_functions.remove_function(&0, node, &1));
        assert_eq!(jump_functions.count(), 0);
        assert!(jump_functions.reverse_lookup(node, &1).is_none());
    }
}
