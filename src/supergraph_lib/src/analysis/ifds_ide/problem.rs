//! The interfaces through which analyses plug into the IFDS/IDE solver.
//!
//! An IDE problem contributes three things:
//! a fact domain `Fact` whose elements are tracked through the program,
//! a value lattice `Value` computed for each reachable fact,
//! and a family of edge functions `EdgeFn` describing how values transform
//! along flows. Pure reachability problems implement the smaller
//! [`IfdsProblem`] interface instead
//! and run through [`IfdsAsIde`] with the binary value lattice.
//!
//! All flow- and edge-function getters receive statement and function terms,
//! not graph nodes, so problem implementations
//! never need to consult the control flow graph for bookkeeping.

use super::super::graph::Cfg;
use super::edge_function::{BinaryDomain, BinaryEdgeFunction, EdgeFunction, EdgeFunctionOps, JoinLattice};
use super::flow_function::FlowFunction;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use petgraph::graph::NodeIndex;

/// An IDE problem: distributive flow functions for fact reachability
/// plus edge functions for value computation.
///
/// The edge-function getters default to the identity function,
/// which turns the value computation into plain reachability
/// unless the problem overrides them.
pub trait IdeProblem {
    /// The dataflow facts tracked by the analysis.
    type Fact: Ord + Clone + std::fmt::Debug;
    /// The lattice of values computed per reachable fact.
    type Value: JoinLattice;
    /// The problem's edge-function family.
    type EdgeFn: EdgeFunctionOps<Value = Self::Value>;

    /// The flow function for an intraprocedural edge `curr -> succ`.
    fn get_normal_flow_function(
        &self,
        curr: &Term<Stmt>,
        succ: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function mapping facts at a call into the callee.
    fn get_call_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function mapping facts at a callee exit
    /// back to the return site of a call.
    fn get_return_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
        exit: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function for facts bypassing a call
    /// on the direct edge to its return site.
    fn get_call_to_return_flow_function(
        &self,
        call: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// An optional summary replacing the descent into a callee.
    /// When a summary is returned, the callee body is not entered
    /// for facts at this call.
    fn get_summary_flow_function(
        &self,
        _call: &Term<Stmt>,
        _callee: &Term<Function>,
    ) -> Option<FlowFunction<Self::Fact>> {
        None
    }

    /// The edge function for an intraprocedural fact edge.
    fn get_normal_edge_function(
        &self,
        _curr: &Term<Stmt>,
        _curr_fact: &Self::Fact,
        _succ: &Term<Stmt>,
        _succ_fact: &Self::Fact,
    ) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::Identity
    }

    /// The edge function for a fact edge entering a callee.
    fn get_call_edge_function(
        &self,
        _call: &Term<Stmt>,
        _call_fact: &Self::Fact,
        _callee: &Term<Function>,
        _entry_fact: &Self::Fact,
    ) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::Identity
    }

    /// The edge function for a fact edge leaving a callee.
    #[allow(clippy::too_many_arguments)]
    fn get_return_edge_function(
        &self,
        _call: &Term<Stmt>,
        _callee: &Term<Function>,
        _exit: &Term<Stmt>,
        _exit_fact: &Self::Fact,
        _return_site: &Term<Stmt>,
        _return_fact: &Self::Fact,
    ) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::Identity
    }

    /// The edge function for a fact edge bypassing a call.
    fn get_call_to_return_edge_function(
        &self,
        _call: &Term<Stmt>,
        _call_fact: &Self::Fact,
        _return_site: &Term<Stmt>,
        _return_fact: &Self::Fact,
    ) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::Identity
    }

    /// The edge function for a fact edge over a summarized call.
    fn get_summary_edge_function(
        &self,
        _call: &Term<Stmt>,
        _call_fact: &Self::Fact,
        _return_site: &Term<Stmt>,
        _return_fact: &Self::Fact,
    ) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::Identity
    }

    /// The seeds the solver starts from.
    fn initial_seeds(&self, cfg: &Cfg) -> InitialSeeds<Self::Fact>;

    /// Create the special zero fact that is reachable everywhere.
    fn create_zero_value(&self) -> Self::Fact;

    /// Return `true` if the given fact is the zero fact.
    fn is_zero_value(&self, fact: &Self::Fact) -> bool {
        *fact == self.create_zero_value()
    }

    /// The top element of the value lattice.
    fn top_element(&self) -> Self::Value {
        Self::Value::top()
    }

    /// The bottom element of the value lattice.
    fn bottom_element(&self) -> Self::Value {
        Self::Value::bottom()
    }

    /// Join two lattice values.
    fn join(&self, value1: &Self::Value, value2: &Self::Value) -> Self::Value {
        value1.join(value2)
    }

    /// The constant-top edge function,
    /// the implicit jump function of all unreached fact pairs.
    fn all_top_function(&self) -> EdgeFunction<Self::EdgeFn> {
        EdgeFunction::AllTop
    }
}

/// An IFDS problem: distributive fact reachability without value
/// computation. Run it with [`super::solver::IfdsSolver`].
pub trait IfdsProblem {
    /// The dataflow facts tracked by the analysis.
    type Fact: Ord + Clone + std::fmt::Debug;

    /// The flow function for an intraprocedural edge `curr -> succ`.
    fn get_normal_flow_function(
        &self,
        curr: &Term<Stmt>,
        succ: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function mapping facts at a call into the callee.
    fn get_call_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function mapping facts at a callee exit
    /// back to the return site of a call.
    fn get_return_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
        exit: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// The flow function for facts bypassing a call
    /// on the direct edge to its return site.
    fn get_call_to_return_flow_function(
        &self,
        call: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact>;

    /// An optional summary replacing the descent into a callee.
    fn get_summary_flow_function(
        &self,
        _call: &Term<Stmt>,
        _callee: &Term<Function>,
    ) -> Option<FlowFunction<Self::Fact>> {
        None
    }

    /// The seeds the solver starts from.
    fn initial_seeds(&self, cfg: &Cfg) -> InitialSeeds<Self::Fact>;

    /// Create the special zero fact that is reachable everywhere.
    fn create_zero_value(&self) -> Self::Fact;

    /// Return `true` if the given fact is the zero fact.
    fn is_zero_value(&self, fact: &Self::Fact) -> bool {
        *fact == self.create_zero_value()
    }
}

/// The embedding of an IFDS problem into the IDE machinery:
/// all edge functions stay the identity
/// and values live in the binary reachability lattice.
/// A fact is reachable at a node
/// iff its computed value is [`BinaryDomain::Bottom`].
pub struct IfdsAsIde<P: IfdsProblem>(pub P);

impl<P: IfdsProblem> IdeProblem for IfdsAsIde<P> {
    type Fact = P::Fact;
    type Value = BinaryDomain;
    type EdgeFn = BinaryEdgeFunction;

    fn get_normal_flow_function(
        &self,
        curr: &Term<Stmt>,
        succ: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact> {
        self.0.get_normal_flow_function(curr, succ)
    }

    fn get_call_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> FlowFunction<Self::Fact> {
        self.0.get_call_flow_function(call, callee)
    }

    fn get_return_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
        exit: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact> {
        self.0.get_return_flow_function(call, callee, exit, return_site)
    }

    fn get_call_to_return_flow_function(
        &self,
        call: &Term<Stmt>,
        return_site: &Term<Stmt>,
    ) -> FlowFunction<Self::Fact> {
        self.0.get_call_to_return_flow_function(call, return_site)
    }

    fn get_summary_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> Option<FlowFunction<Self::Fact>> {
        self.0.get_summary_flow_function(call, callee)
    }

    fn initial_seeds(&self, cfg: &Cfg) -> InitialSeeds<Self::Fact> {
        self.0.initial_seeds(cfg)
    }

    fn create_zero_value(&self) -> Self::Fact {
        self.0.create_zero_value()
    }

    fn is_zero_value(&self, fact: &Self::Fact) -> bool {
        self.0.is_zero_value(fact)
    }
}

/// The set of node/fact pairs a solve starts from.
///
/// Seeds should sit at function entry points.
/// Error messages for functions that could not be seeded are collected
/// here and drained into the solver log.
#[derive(Debug, Default)]
pub struct InitialSeeds<D> {
    seeds: Vec<(NodeIndex, D)>,
    logs: Vec<LogMessage>,
}

impl<D: Clone> InitialSeeds<D> {
    /// Create an empty seed set.
    pub fn new() -> InitialSeeds<D> {
        InitialSeeds {
            seeds: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Seed the given fact at the entry points of the named functions.
    ///
    /// Functions without a definition in the control flow graph
    /// are skipped with an error message.
    pub fn at_function_entries(cfg: &Cfg, function_names: &[&str], fact: D) -> InitialSeeds<D> {
        let mut seeds = InitialSeeds::new();
        for name in function_names {
            match cfg
                .all_functions()
                .find(|function| function.term.name == *name)
            {
                Some(function) => {
                    for entry in cfg.start_points_of(&function.tid) {
                        seeds.add(entry, fact.clone());
                    }
                }
                None => seeds.logs.push(
                    LogMessage::new_error(format!(
                        "Cannot seed function {name}: no definition was found."
                    ))
                    .source("IDE solver"),
                ),
            }
        }
        seeds
    }

    /// Add a single seed.
    pub fn add(&mut self, node: NodeIndex, fact: D) {
        self.seeds.push((node, fact));
    }

    /// The seeds and the collected messages.
    pub fn into_parts(self) -> (Vec<(NodeIndex, D)>, Vec<LogMessage>) {
        (self.seeds, self.logs)
    }
}

/// Configuration of the IFDS/IDE solver.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct SolverConfig {
    /// Automatically seed the zero fact at every seeded node.
    /// Disable only if the analysis manages the zero fact itself.
    pub auto_add_zero: bool,
    /// Propagate flows leaving a function
    /// whose callers were never entered during the solve,
    /// e.g. when seeding starts below the entry point of the program.
    /// Only flows of the zero fact are followed.
    pub follow_returns_past_seeds: bool,
    /// Run the value-computation phase after the jump functions
    /// are complete. Disable for pure reachability queries
    /// through the IDE interface.
    pub compute_values: bool,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            auto_add_zero: true,
            follow_returns_past_seeds: false,
            compute_values: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::callgraph::resolver::ClassHierarchyResolver;
    use super::super::super::callgraph::CallGraph;
    use super::*;

    #[test]
    fn seeding_missing_functions_is_reported() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![Stmt::mock_return("ret", None)],
        )]);
        let call_graph = CallGraph::build(&program, &mut ClassHierarchyResolver);
        let cfg = Cfg::build(&program, &call_graph);

        let seeds = InitialSeeds::at_function_entries(&cfg, &["main", "ghost"], 0u32);
        let (seeds, logs) = seeds.into_parts();
        assert_eq!(seeds, vec![(cfg.node_of(&Tid::new("ret")).unwrap(), 0)]);
        assert_eq!(logs.len(), 1);
        assert!(logs[0].text.contains("ghost"));
    }

    #[test]
    fn the_default_config_is_the_safe_one() {
        let config = SolverConfig::default();
        assert!(config.auto_add_zero);
        assert!(!config.follow_returns_past_seeds);
        assert!(config.compute_values);
    }
}
