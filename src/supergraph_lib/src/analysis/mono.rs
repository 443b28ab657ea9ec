//! An interprocedural monotone framework with bounded call strings.
//!
//! In contrast to the summary-based [`ifds_ide`](super::ifds_ide) engine,
//! this engine places no distributivity requirement on the transfer
//! functions. It propagates whole domain values over the edges of the ICFG
//! and achieves context sensitivity by tagging every value with the
//! call string under which it arose,
//! truncated to a configurable depth.
//!
//! ## Context handling
//!
//! Entering a callee pushes the call site onto the string,
//! dropping the oldest entry if the string would exceed the depth bound.
//! A return edge only accepts values whose string starts with its call site;
//! the empty string stands for "callers truncated away"
//! and is accepted by every return edge of the exit statement.
//! With depth zero the analysis degenerates to a context-insensitive one.
//!
//! Values arriving at the same node under the same (truncated) string are
//! joined, so shortening the depth trades precision for a smaller state
//! space. The framework terminates for domains without infinite ascending
//! chains since the number of strings per node is finite.
//!
//! The heavy lifting is done by the generic [`fixpoint`](super::fixpoint)
//! engine; this module contributes the context bookkeeping
//! and the edge-kind dispatch into the problem's flow functions.

use super::fixpoint::{Computation, FixpointProblem};
use super::graph::{Cfg, CfgEdge, CfgGraph, CfgNode};
use super::CancellationFlag;
use crate::intermediate_representation::*;
use crate::prelude::*;
use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::BTreeMap;

/// A sequence of call sites, most recent last,
/// truncated to a configured maximum length.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Default)]
pub struct CallString(Vec<Tid>);

impl CallString {
    /// The empty call string. It matches every return edge.
    pub fn empty() -> CallString {
        CallString::default()
    }

    /// Append a call site, dropping the oldest entries
    /// if the string would grow beyond `depth`.
    pub fn push_truncating(&self, call: Tid, depth: usize) -> CallString {
        let mut calls = self.0.clone();
        calls.push(call);
        while calls.len() > depth {
            calls.remove(0);
        }
        CallString(calls)
    }

    /// Split off the most recent call site.
    /// Returns `None` for the empty string.
    pub fn pop(&self) -> Option<(Tid, CallString)> {
        let mut calls = self.0.clone();
        let call = calls.pop()?;
        Some((call, CallString(calls)))
    }

    /// Return `true` if all call sites have been truncated away.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CallString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "[")?;
        for (index, call) in self.0.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{call}")?;
        }
        write!(formatter, "]")
    }
}

/// A problem for the monotone framework:
/// a join-semilattice domain and one flow function per ICFG edge kind.
///
/// Flow functions may return `None` to indicate that nothing flows
/// over the edge for the given input value.
pub trait InterMonoProblem {
    /// The domain of the analysis. Values are joined with
    /// [`merge`](Self::merge), which must be monotone.
    type Domain: PartialEq + Eq + Clone;

    /// Compute the join of two values.
    fn merge(&self, value1: &Self::Domain, value2: &Self::Domain) -> Self::Domain;

    /// Flow over a non-call statement to its intraprocedural successors.
    fn normal_flow(&self, stmt: &Term<Stmt>, value: &Self::Domain) -> Option<Self::Domain>;

    /// Flow from a call statement into the entry point of a callee.
    fn call_flow(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
        value: &Self::Domain,
    ) -> Option<Self::Domain>;

    /// Flow from an exit statement of a callee to the return site of a call.
    /// `value` is the value at the exit statement.
    fn return_flow(
        &self,
        call: &Term<Stmt>,
        exit: &Term<Stmt>,
        return_site: &Term<Stmt>,
        value: &Self::Domain,
    ) -> Option<Self::Domain>;

    /// Flow from a call statement directly to its return site,
    /// carrying the state the callee cannot touch.
    fn call_to_return_flow(&self, call: &Term<Stmt>, value: &Self::Domain)
        -> Option<Self::Domain>;

    /// The start value at the entry point of each listed function.
    fn initial_seeds(&self) -> BTreeMap<Tid, Self::Domain>;
}

/// Configuration parameters of the monotone framework.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct MonoSolverConfig {
    /// The maximum length of call strings.
    pub context_depth: usize,
}

impl Default for MonoSolverConfig {
    fn default() -> MonoSolverConfig {
        MonoSolverConfig { context_depth: 3 }
    }
}

/// The fixpoint problem fed into the generic engine:
/// values per node are maps from call strings to domain values.
struct MonoFixpointContext<'a, P: InterMonoProblem> {
    problem: P,
    cfg: &'a Cfg<'a>,
    context_depth: usize,
}

impl<'a, P: InterMonoProblem> MonoFixpointContext<'a, P> {
    /// Dispatch one `(call string, value)` entry over an edge.
    /// Returns the call string at the target and the transferred value.
    fn transfer_entry(
        &self,
        edge_kind: &CfgEdge,
        start: NodeIndex,
        end: NodeIndex,
        context: &CallString,
        value: &P::Domain,
    ) -> Option<(CallString, P::Domain)> {
        match edge_kind {
            CfgEdge::Normal => {
                let transferred = self.problem.normal_flow(self.cfg.stmt(start), value)?;
                Some((context.clone(), transferred))
            }
            CfgEdge::Call => {
                let call = self.cfg.stmt(start);
                let callee = self.cfg.function_of(end);
                let transferred = self.problem.call_flow(call, callee, value)?;
                Some((
                    context.push_truncating(call.tid.clone(), self.context_depth),
                    transferred,
                ))
            }
            CfgEdge::CallToReturn => {
                let transferred = self
                    .problem
                    .call_to_return_flow(self.cfg.stmt(start), value)?;
                Some((context.clone(), transferred))
            }
            CfgEdge::Return { call } => {
                let caller_context = match context.pop() {
                    // The matching caller is known and must fit the edge.
                    Some((top, rest)) if top == self.cfg.stmt(*call).tid => rest,
                    Some(_) => return None,
                    // All callers were truncated away.
                    None => CallString::empty(),
                };
                let transferred = self.problem.return_flow(
                    self.cfg.stmt(*call),
                    self.cfg.stmt(start),
                    self.cfg.stmt(end),
                    value,
                )?;
                Some((caller_context, transferred))
            }
        }
    }
}

impl<'a, P: InterMonoProblem> FixpointProblem for MonoFixpointContext<'a, P> {
    type EdgeLabel = CfgEdge;
    type NodeLabel = CfgNode<'a>;
    type Value = BTreeMap<CallString, P::Domain>;

    fn graph(&self) -> &CfgGraph<'a> {
        self.cfg.graph()
    }

    fn merge(&self, value1: &Self::Value, value2: &Self::Value) -> Self::Value {
        let mut merged = value1.clone();
        for (context, value) in value2 {
            match merged.get(context) {
                Some(existing) => {
                    merged.insert(context.clone(), self.problem.merge(existing, value));
                }
                None => {
                    merged.insert(context.clone(), value.clone());
                }
            }
        }
        merged
    }

    fn transfer_edge(&self, value: &Self::Value, edge: EdgeIndex) -> Option<Self::Value> {
        let graph = self.cfg.graph();
        let (start, end) = graph
            .edge_endpoints(edge)
            .expect("Edge endpoints not found in the graph");
        let edge_kind = &graph[edge];
        let mut transferred = BTreeMap::new();
        for (context, entry_value) in value {
            if let Some((target_context, target_value)) =
                self.transfer_entry(edge_kind, start, end, context, entry_value)
            {
                match transferred.get(&target_context) {
                    Some(existing) => {
                        let joined = self.problem.merge(existing, &target_value);
                        transferred.insert(target_context, joined);
                    }
                    None => {
                        transferred.insert(target_context, target_value);
                    }
                }
            }
        }
        if transferred.is_empty() {
            None
        } else {
            Some(transferred)
        }
    }
}

/// The solver of the monotone framework.
pub struct InterMonoSolver<'a, P: InterMonoProblem> {
    computation: Computation<MonoFixpointContext<'a, P>>,
}

impl<'a, P: InterMonoProblem> InterMonoSolver<'a, P> {
    /// Create a solver and seed it with the problem's initial values,
    /// each under the empty call string.
    ///
    /// Seeds for functions without a body are ignored.
    pub fn new(problem: P, cfg: &'a Cfg<'a>, config: MonoSolverConfig) -> InterMonoSolver<'a, P> {
        let seeds = problem.initial_seeds();
        let context = MonoFixpointContext {
            problem,
            cfg,
            context_depth: config.context_depth,
        };
        let mut computation = Computation::new(context, None);
        for (function, value) in seeds {
            for entry in cfg.start_points_of(&function) {
                computation.set_value(entry, BTreeMap::from([(CallString::empty(), value.clone())]));
            }
        }
        InterMonoSolver { computation }
    }

    /// Run the computation to its fixpoint.
    pub fn solve(&mut self) {
        self.computation.compute();
    }

    /// Run the computation until it reaches its fixpoint
    /// or the given flag requests cancellation.
    /// Returns `true` if the fixpoint was reached.
    /// A cancelled solver resumes where it stopped on the next call.
    pub fn solve_interruptible(&mut self, cancellation: &CancellationFlag) -> bool {
        self.computation.compute_interruptible(cancellation);
        self.computation.has_stabilized()
    }

    /// The values at a node, per call string.
    pub fn value_at(&self, node: NodeIndex) -> Option<&BTreeMap<CallString, P::Domain>> {
        self.computation.value_of(node)
    }

    /// The join of the values at a node over all call strings.
    pub fn merged_value_at(&self, node: NodeIndex) -> Option<P::Domain> {
        let values = self.computation.value_of(node)?;
        let problem = &self.computation.problem().problem;
        values
            .values()
            .fold(None, |merged: Option<P::Domain>, value| match merged {
                Some(merged) => Some(problem.merge(&merged, value)),
                None => Some(value.clone()),
            })
    }

    /// Return `true` if the computed values are a fixpoint.
    pub fn has_stabilized(&self) -> bool {
        self.computation.has_stabilized()
    }

    /// The problem the solver was created with.
    pub fn problem(&self) -> &P {
        &self.computation.problem().problem
    }
}
