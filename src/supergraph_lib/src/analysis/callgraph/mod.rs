//! Construction, queries and (de)serialization of call graphs.
//!
//! A call graph has one node per function (defined or external) and one edge
//! per resolved call-site/callee pair, directed from caller to callee and
//! labeled with the call site.
//! Which callees a call site gets is decided by a pluggable
//! [`CallTargetResolver`], see the [`resolver`] module.
//!
//! ## Construction
//!
//! [`CallGraph::build`] repeatedly resolves every call site of every defined
//! function until an entire pass adds no new edge.
//! For the CHA and RTA resolvers the first pass is already complete.
//! The on-the-fly resolver refines its alias information as a side effect of
//! resolving calls, which can make previously opaque indirect calls
//! resolvable, so additional passes genuinely occur.
//!
//! Call sites that no pass could resolve stay in the graph without outgoing
//! edges. Control-flow construction degrades them to a plain
//! call-to-return edge, see [`super::graph`].
//!
//! ## Serialization
//!
//! [`CallGraph::to_json`] exports the graph in a stable, human-diffable
//! format keyed by function names:
//!
//! ```json
//! { "CallGraph": { "main": { "call_site": ["callee_a", "callee_b"] } } }
//! ```
//!
//! [`CallGraph::from_json`] re-anchors such a document against a program,
//! failing with a descriptive error if a function or call site named in the
//! document does not exist.

use crate::intermediate_representation::*;
use crate::prelude::*;
use fnv::FnvHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};

pub mod resolver;

use resolver::CallTargetResolver;

/// The call graph of a program.
pub struct CallGraph {
    /// Nodes are functions, edges lead from caller to callee
    /// and carry the call site as their weight.
    graph: DiGraph<Tid, Tid>,
    /// The graph node of each function.
    nodes: FnvHashMap<Tid, NodeIndex>,
    /// The resolved callees of each call site.
    /// Unresolved call sites are present with an empty set.
    callees: FnvHashMap<Tid, BTreeSet<Tid>>,
}

/// The JSON document format of a serialized call graph:
/// caller name to call-site ID to callee names.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
struct CallGraphJson {
    #[serde(rename = "CallGraph")]
    call_graph: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl CallGraph {
    /// Create a call graph without any call edges:
    /// one node per function and an empty callee set per call site.
    fn empty(program: &Program) -> CallGraph {
        let mut graph = DiGraph::new();
        let mut nodes = FnvHashMap::default();
        let mut callees = FnvHashMap::default();
        for function in &program.functions {
            let node = graph.add_node(function.tid.clone());
            nodes.insert(function.tid.clone(), node);
            for call in function.term.call_sites() {
                callees.insert(call.tid.clone(), BTreeSet::new());
            }
        }
        CallGraph {
            graph,
            nodes,
            callees,
        }
    }

    /// Build the call graph of a program with the given resolution strategy.
    ///
    /// Resolution runs to a fixed point:
    /// passes over all call sites are repeated until no pass adds an edge.
    pub fn build<R: CallTargetResolver>(program: &Program, resolver: &mut R) -> CallGraph {
        let mut call_graph = CallGraph::empty(program);
        loop {
            let mut changed = false;
            for function in program.functions.iter().filter(|function| !function.term.is_external()) {
                for call in function.term.call_sites() {
                    for callee in resolver.resolve(program, function, call) {
                        changed |= call_graph.add_call_edge(&function.tid, &call.tid, &callee);
                    }
                }
            }
            if !changed {
                return call_graph;
            }
        }
    }

    /// Insert a call edge. Returns `true` if the edge was not yet present.
    fn add_call_edge(&mut self, caller: &Tid, call_site: &Tid, callee: &Tid) -> bool {
        let resolved = self.callees.entry(call_site.clone()).or_default();
        if !resolved.insert(callee.clone()) {
            return false;
        }
        let caller_node = self.node_of(caller);
        let callee_node = self.node_of(callee);
        self.graph.add_edge(caller_node, callee_node, call_site.clone());
        true
    }

    /// The graph node of a function.
    /// Panics if the function is not part of the graph.
    fn node_of(&self, function: &Tid) -> NodeIndex {
        match self.nodes.get(function) {
            Some(&node) => node,
            None => panic!("Function {function} is not a node of the call graph."),
        }
    }

    /// The functions that the given call site may invoke.
    /// Empty for unresolved call sites and for statements that are not calls.
    pub fn callees_of(&self, call_site: &Tid) -> BTreeSet<Tid> {
        self.callees.get(call_site).cloned().unwrap_or_default()
    }

    /// The call sites from which the given function may be invoked.
    pub fn callers_of(&self, function: &Tid) -> BTreeSet<Tid> {
        let Some(&node) = self.nodes.get(function) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.weight().clone())
            .collect()
    }

    /// Return `true` if the call site is known but no callee could be
    /// resolved for it.
    pub fn is_unresolved_call(&self, call_site: &Tid) -> bool {
        matches!(self.callees.get(call_site), Some(resolved) if resolved.is_empty())
    }

    /// The underlying graph with functions as nodes
    /// and call sites as edge weights.
    pub fn graph(&self) -> &DiGraph<Tid, Tid> {
        &self.graph
    }

    /// Serialize the call graph into its JSON document format.
    ///
    /// Functions are identified by name, call sites by their term ID.
    pub fn to_json(&self, program: &Program) -> serde_json::Value {
        let mut document: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for function in program.functions.iter().filter(|function| !function.term.is_external()) {
            let calls: BTreeMap<String, Vec<String>> = function
                .term
                .call_sites()
                .iter()
                .map(|call| {
                    let callee_names = self
                        .callees_of(&call.tid)
                        .iter()
                        .filter_map(|tid| program.get_function_by_tid(tid))
                        .map(|callee| callee.term.name.clone())
                        .collect();
                    (call.tid.to_string(), callee_names)
                })
                .collect();
            document.insert(function.term.name.clone(), calls);
        }
        serde_json::json!(CallGraphJson {
            call_graph: document
        })
    }

    /// Deserialize a call graph from its JSON document format,
    /// re-anchoring all names and call-site IDs against the given program.
    ///
    /// Fails if the document names a function or call site
    /// that does not exist in the program.
    pub fn from_json(json: serde_json::Value, program: &Program) -> Result<CallGraph, Error> {
        let document: CallGraphJson =
            serde_json::from_value(json).context("The call graph document is malformed.")?;
        let mut call_graph = CallGraph::empty(program);
        for (caller_name, calls) in &document.call_graph {
            let caller = program
                .get_function_definition(caller_name)
                .ok_or_else(|| anyhow!("Unknown caller function {caller_name}."))?;
            for (call_id, callee_names) in calls {
                let call = caller
                    .term
                    .call_sites()
                    .into_iter()
                    .find(|call| call.tid.to_string() == *call_id)
                    .ok_or_else(|| {
                        anyhow!("Function {caller_name} has no call site with ID {call_id}.")
                    })?;
                for callee_name in callee_names {
                    let callee = program.get_function(callee_name).ok_or_else(|| {
                        anyhow!("Unknown callee function {callee_name} at call site {call_id}.")
                    })?;
                    call_graph.add_call_edge(&caller.tid, &call.tid, &callee.tid);
                }
            }
        }
        Ok(call_graph)
    }
}
