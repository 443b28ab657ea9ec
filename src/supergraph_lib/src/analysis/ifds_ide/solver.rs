//! The IFDS/IDE tabulation solver.
//!
//! The solver works in two phases.
//!
//! ## Phase 1: jump-function construction
//!
//! A worklist of path edges `(d1, n, d2)` is processed until exhaustion.
//! Each path edge states that fact `d2` holds at node `n`
//! if fact `d1` holds at the entry point of the function containing `n`,
//! and the jump-function table holds the composed edge function of the path.
//! Propagating an edge joins its edge function with the stored one
//! and only re-enqueues the edge if the join changed the table,
//! which bounds the work by the height of the edge-function lattice.
//!
//! Calls descend into callees by seeding a self-loop path edge
//! at the callee entry and recording the calling context.
//! Exits record an end summary of the callee
//! and replay it against all recorded contexts,
//! so each callee is analyzed once per distinct entry fact
//! no matter how many call sites it has.
//!
//! ## Phase 2: value computation
//!
//! Seed values are propagated along the jump functions,
//! first through the call structure to all function entries,
//! then within each function by evaluating the jump functions
//! of every node. Fact/value pairs that never leave the top element
//! are not recorded.
//!
//! ## Cancellation
//!
//! Both phases poll a [`CancellationFlag`] and return
//! [`SolveStatus::Interrupted`] when it is raised.
//! The phase-1 worklist survives the interruption,
//! so a later call resumes where the solve stopped.
//! An interrupted value phase starts over on resumption;
//! it is cheap compared to the jump-function construction.

use super::super::graph::Cfg;
use super::super::CancellationFlag;
use super::cache::FlowFunctionCache;
use super::edge_function::{BinaryDomain, EdgeFunction, JoinLattice};
use super::jump_functions::JumpFunctions;
use super::problem::{IdeProblem, IfdsAsIde, IfdsProblem, SolverConfig};
use super::results::SolverResults;
use crate::intermediate_representation::*;
use crate::prelude::*;
use crate::utils::log::LogMessage;
use crate::utils::table::Table;
use fnv::FnvHashMap;
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A path edge `(d1, n, d2)`: fact `d2` holds at `n`
/// if fact `d1` holds at the entry point of the function containing `n`.
#[derive(Debug, PartialEq, Eq, Clone)]
struct PathEdge<D> {
    source_fact: D,
    target: NodeIndex,
    target_fact: D,
}

/// Per entry fact of a start point:
/// the call nodes and call-site facts that entered with it.
type IncomingContexts<D> = BTreeMap<D, BTreeMap<NodeIndex, BTreeSet<D>>>;

/// Per entry fact of a start point:
/// the `(exit, exit fact)` pairs reached from it
/// together with the summarized edge function through the function body.
type EndSummaries<D, F> = BTreeMap<D, BTreeMap<(NodeIndex, D), EdgeFunction<F>>>;

/// The outcome of a (possibly partial) solver run.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SolveStatus {
    /// All phases ran to completion, the results are available.
    Converged,
    /// The cancellation flag was raised. The solver keeps its state
    /// and a later call continues the solve.
    Interrupted,
}

/// Counters describing the work done by a solve.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
pub struct SolverStatistics {
    /// The number of path edges taken off the worklist.
    pub path_edges_processed: u64,
    /// The number of changes to the jump-function table.
    pub jump_function_updates: u64,
    /// The number of end summaries recorded at callee exits.
    pub end_summaries_recorded: u64,
    /// The number of times a recorded end summary was applied
    /// at a call site instead of re-analyzing the callee.
    pub end_summary_applications: u64,
    /// The number of changes to the value table during phase 2.
    pub value_updates: u64,
}

/// The IDE tabulation solver.
///
/// The solver borrows the ICFG and owns the problem.
/// Seeds are submitted on construction;
/// [`solve`](IdeSolver::solve) runs the tabulation
/// and [`results`](IdeSolver::results) exposes the value table
/// once the solve converged.
pub struct IdeSolver<'a, P: IdeProblem> {
    problem: P,
    cfg: &'a Cfg<'a>,
    config: SolverConfig,
    zero: P::Fact,
    jump_functions: JumpFunctions<P::Fact, P::EdgeFn>,
    cache: FlowFunctionCache<P::Fact>,
    worklist: VecDeque<PathEdge<P::Fact>>,
    incoming: FnvHashMap<NodeIndex, IncomingContexts<P::Fact>>,
    end_summaries: FnvHashMap<NodeIndex, EndSummaries<P::Fact, P::EdgeFn>>,
    /// The submitted seeds, including automatically added zero facts.
    seeds: Vec<(NodeIndex, P::Fact)>,
    values: Table<NodeIndex, P::Fact, P::Value>,
    /// Return sites reached by following a return past the seeds.
    /// They act as additional value seeds in phase 2.
    unbalanced_return_sites: BTreeSet<NodeIndex>,
    statistics: SolverStatistics,
    logs: Vec<LogMessage>,
    result_hook: Option<Box<dyn FnMut(&Term<Stmt>, &P::Fact, &P::Value) + 'a>>,
    converged: bool,
}

impl<'a, P: IdeProblem> IdeSolver<'a, P> {
    /// Create a solver for the given problem
    /// and submit the initial seeds of the problem.
    pub fn new(problem: P, cfg: &'a Cfg<'a>, config: SolverConfig) -> IdeSolver<'a, P> {
        let zero = problem.create_zero_value();
        let mut solver = IdeSolver {
            problem,
            cfg,
            config,
            zero,
            jump_functions: JumpFunctions::new(),
            cache: FlowFunctionCache::new(),
            worklist: VecDeque::new(),
            incoming: FnvHashMap::default(),
            end_summaries: FnvHashMap::default(),
            seeds: Vec::new(),
            values: Table::new(),
            unbalanced_return_sites: BTreeSet::new(),
            statistics: SolverStatistics::default(),
            logs: Vec::new(),
            result_hook: None,
            converged: false,
        };
        solver.submit_initial_seeds();
        solver
    }

    /// Run the solve to completion.
    pub fn solve(&mut self) -> SolveStatus {
        self.solve_interruptible(&CancellationFlag::new())
    }

    /// Run the solve until it converges or the given flag is raised.
    ///
    /// On [`SolveStatus::Interrupted`] the solver state is kept
    /// and a later call with an unraised flag continues the solve.
    pub fn solve_interruptible(&mut self, cancellation: &CancellationFlag) -> SolveStatus {
        if self.converged {
            return SolveStatus::Converged;
        }
        if self.construct_jump_functions(cancellation) == SolveStatus::Interrupted {
            return SolveStatus::Interrupted;
        }
        if self.config.compute_values && self.compute_values(cancellation) == SolveStatus::Interrupted
        {
            return SolveStatus::Interrupted;
        }
        self.converged = true;
        self.logs.push(
            LogMessage::new_debug(format!(
                "Solve converged: {} path edges processed, {} jump functions recorded.",
                self.statistics.path_edges_processed,
                self.jump_functions.count(),
            ))
            .source("IDE solver"),
        );
        SolveStatus::Converged
    }

    /// The computed values. `None` until the solve converged.
    pub fn results(&self) -> Option<SolverResults<'_, P::Fact, P::Value>> {
        self.converged.then(|| SolverResults::new(&self.values))
    }

    /// The problem the solver was constructed with.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Counters describing the work done so far.
    /// The counters keep accumulating over resumed solves.
    pub fn statistics(&self) -> &SolverStatistics {
        &self.statistics
    }

    /// The number of jump functions currently recorded.
    pub fn jump_function_count(&self) -> usize {
        self.jump_functions.count()
    }

    /// The log messages generated so far.
    pub fn logs(&self) -> &[LogMessage] {
        &self.logs
    }

    /// Return sites that were only reached by following a return
    /// past the seeds.
    pub fn unbalanced_return_sites(&self) -> &BTreeSet<NodeIndex> {
        &self.unbalanced_return_sites
    }

    /// Install a callback that fires for every recorded value change
    /// during phase 2, e.g. to stream results to another thread.
    ///
    /// A resumed value phase starts over,
    /// so the callback may see the same node/fact pair again.
    pub fn set_result_hook(
        &mut self,
        hook: impl FnMut(&Term<Stmt>, &P::Fact, &P::Value) + 'a,
    ) {
        self.result_hook = Some(Box::new(hook));
    }

    fn submit_initial_seeds(&mut self) {
        let (mut seeds, logs) = self.problem.initial_seeds(self.cfg).into_parts();
        self.logs.extend(logs);
        if self.config.auto_add_zero {
            let nodes: BTreeSet<NodeIndex> = seeds.iter().map(|(node, _)| *node).collect();
            for node in nodes {
                let has_zero = seeds
                    .iter()
                    .any(|(seeded, fact)| *seeded == node && self.problem.is_zero_value(fact));
                if !has_zero {
                    seeds.push((node, self.zero.clone()));
                }
            }
        }
        for (node, fact) in &seeds {
            self.propagate(self.zero.clone(), *node, fact.clone(), EdgeFunction::Identity);
        }
        self.seeds = seeds;
    }

    /// Join a contribution into the jump function of `(d1, n, d2)`
    /// and enqueue the path edge if the table changed.
    fn propagate(
        &mut self,
        source_fact: P::Fact,
        target: NodeIndex,
        target_fact: P::Fact,
        contribution: EdgeFunction<P::EdgeFn>,
    ) {
        let current = self
            .jump_functions
            .function_of(&source_fact, target, &target_fact)
            .cloned()
            .unwrap_or(EdgeFunction::AllTop);
        let joined = current.join_with(&contribution);
        if joined != current {
            self.jump_functions
                .add_function(source_fact.clone(), target, target_fact.clone(), joined);
            self.statistics.jump_function_updates += 1;
            self.worklist.push_back(PathEdge {
                source_fact,
                target,
                target_fact,
            });
        }
    }

    fn construct_jump_functions(&mut self, cancellation: &CancellationFlag) -> SolveStatus {
        while let Some(edge) = self.worklist.pop_front() {
            if cancellation.is_cancelled() {
                self.worklist.push_front(edge);
                self.logs.push(
                    LogMessage::new_info("Jump-function construction was cancelled.")
                        .source("IDE solver"),
                );
                return SolveStatus::Interrupted;
            }
            self.statistics.path_edges_processed += 1;
            let function = self
                .jump_functions
                .function_of(&edge.source_fact, edge.target, &edge.target_fact)
                .cloned()
                .expect("Jump function of a queued path edge not found.");
            if self.cfg.is_call_site(edge.target) {
                self.process_call(&edge, function);
            } else if self.cfg.is_exit_statement(edge.target) {
                self.process_exit(&edge, function);
            } else {
                self.process_normal(&edge, function);
            }
        }
        SolveStatus::Converged
    }

    /// Propagate a path edge along the intraprocedural successors
    /// of its target.
    fn process_normal(&mut self, edge: &PathEdge<P::Fact>, function: EdgeFunction<P::EdgeFn>) {
        let curr = edge.target;
        for succ in self.cfg.successors_of(curr) {
            let flow = {
                let problem = &self.problem;
                let cfg = self.cfg;
                self.cache.normal(curr, succ, || {
                    problem.get_normal_flow_function(cfg.stmt(curr), cfg.stmt(succ))
                })
            };
            for target_fact in flow.compute_targets(&edge.target_fact) {
                let edge_function = self.problem.get_normal_edge_function(
                    self.cfg.stmt(curr),
                    &edge.target_fact,
                    self.cfg.stmt(succ),
                    &target_fact,
                );
                self.propagate(
                    edge.source_fact.clone(),
                    succ,
                    target_fact,
                    function.compose_with(&edge_function),
                );
            }
        }
    }

    /// Process a path edge ending at a call:
    /// descend into the callees (or apply a summary)
    /// and propagate the flows bypassing the call.
    fn process_call(&mut self, edge: &PathEdge<P::Fact>, function: EdgeFunction<P::EdgeFn>) {
        let call = edge.target;
        let call_stmt = self.cfg.stmt(call);
        let return_sites = self.cfg.return_sites_of_call_at(call);

        for callee in self.cfg.callees_of_call_at(call) {
            if let Some(summary) = self.problem.get_summary_flow_function(call_stmt, callee) {
                // The summary replaces the descent into this callee.
                for &return_site in &return_sites {
                    for target_fact in summary.compute_targets(&edge.target_fact) {
                        let edge_function = self.problem.get_summary_edge_function(
                            call_stmt,
                            &edge.target_fact,
                            self.cfg.stmt(return_site),
                            &target_fact,
                        );
                        self.propagate(
                            edge.source_fact.clone(),
                            return_site,
                            target_fact,
                            function.compose_with(&edge_function),
                        );
                    }
                }
                continue;
            }
            let call_flow = {
                let problem = &self.problem;
                self.cache.call(call, &callee.tid, || {
                    problem.get_call_flow_function(call_stmt, callee)
                })
            };
            for entry in self.cfg.start_points_of(&callee.tid) {
                for entry_fact in call_flow.compute_targets(&edge.target_fact) {
                    // Seed the analysis of the callee with a self-loop.
                    self.propagate(
                        entry_fact.clone(),
                        entry,
                        entry_fact.clone(),
                        EdgeFunction::Identity,
                    );
                    self.incoming
                        .entry(entry)
                        .or_default()
                        .entry(entry_fact.clone())
                        .or_default()
                        .entry(call)
                        .or_default()
                        .insert(edge.target_fact.clone());
                    // Apply the end summaries already computed for this
                    // entry fact instead of waiting for the callee exits
                    // to be processed again.
                    let summaries: Vec<((NodeIndex, P::Fact), EdgeFunction<P::EdgeFn>)> = self
                        .end_summaries
                        .get(&entry)
                        .and_then(|summaries| summaries.get(&entry_fact))
                        .into_iter()
                        .flatten()
                        .map(|(key, summary)| (key.clone(), summary.clone()))
                        .collect();
                    for ((exit, exit_fact), callee_summary) in summaries {
                        for &return_site in &return_sites {
                            let return_flow = {
                                let problem = &self.problem;
                                let cfg = self.cfg;
                                self.cache.ret(call, exit, return_site, || {
                                    problem.get_return_flow_function(
                                        call_stmt,
                                        callee,
                                        cfg.stmt(exit),
                                        cfg.stmt(return_site),
                                    )
                                })
                            };
                            for return_fact in return_flow.compute_targets(&exit_fact) {
                                let call_edge = self.problem.get_call_edge_function(
                                    call_stmt,
                                    &edge.target_fact,
                                    callee,
                                    &entry_fact,
                                );
                                let return_edge = self.problem.get_return_edge_function(
                                    call_stmt,
                                    callee,
                                    self.cfg.stmt(exit),
                                    &exit_fact,
                                    self.cfg.stmt(return_site),
                                    &return_fact,
                                );
                                let through_callee = call_edge
                                    .compose_with(&callee_summary)
                                    .compose_with(&return_edge);
                                self.statistics.end_summary_applications += 1;
                                self.propagate(
                                    edge.source_fact.clone(),
                                    return_site,
                                    return_fact,
                                    function.compose_with(&through_callee),
                                );
                            }
                        }
                    }
                }
            }
        }

        // Flows bypassing the call.
        for &return_site in &return_sites {
            let flow = {
                let problem = &self.problem;
                let cfg = self.cfg;
                self.cache.call_to_return(call, return_site, || {
                    problem.get_call_to_return_flow_function(call_stmt, cfg.stmt(return_site))
                })
            };
            for target_fact in flow.compute_targets(&edge.target_fact) {
                let edge_function = self.problem.get_call_to_return_edge_function(
                    call_stmt,
                    &edge.target_fact,
                    self.cfg.stmt(return_site),
                    &target_fact,
                );
                self.propagate(
                    edge.source_fact.clone(),
                    return_site,
                    target_fact,
                    function.compose_with(&edge_function),
                );
            }
        }
    }

    /// Process a path edge ending at an exit statement:
    /// record the end summary of the function
    /// and replay it against all recorded calling contexts.
    fn process_exit(&mut self, edge: &PathEdge<P::Fact>, function: EdgeFunction<P::EdgeFn>) {
        let exit = edge.target;
        let callee = self.cfg.function_of(exit);
        let exit_stmt = self.cfg.stmt(exit);
        for entry in self.cfg.start_points_of(&callee.tid) {
            self.end_summaries
                .entry(entry)
                .or_default()
                .entry(edge.source_fact.clone())
                .or_default()
                .insert((exit, edge.target_fact.clone()), function.clone());
            self.statistics.end_summaries_recorded += 1;

            let incoming: Vec<(NodeIndex, BTreeSet<P::Fact>)> = self
                .incoming
                .get(&entry)
                .and_then(|contexts| contexts.get(&edge.source_fact))
                .into_iter()
                .flatten()
                .map(|(call, facts)| (*call, facts.clone()))
                .collect();

            for (call, call_facts) in &incoming {
                let call_stmt = self.cfg.stmt(*call);
                for return_site in self.cfg.return_sites_of_call_at(*call) {
                    let return_flow = {
                        let problem = &self.problem;
                        let cfg = self.cfg;
                        self.cache.ret(*call, exit, return_site, || {
                            problem.get_return_flow_function(
                                call_stmt,
                                callee,
                                exit_stmt,
                                cfg.stmt(return_site),
                            )
                        })
                    };
                    for return_fact in return_flow.compute_targets(&edge.target_fact) {
                        for call_fact in call_facts {
                            let call_edge = self.problem.get_call_edge_function(
                                call_stmt,
                                call_fact,
                                callee,
                                &edge.source_fact,
                            );
                            let return_edge = self.problem.get_return_edge_function(
                                call_stmt,
                                callee,
                                exit_stmt,
                                &edge.target_fact,
                                self.cfg.stmt(return_site),
                                &return_fact,
                            );
                            let through_callee =
                                call_edge.compose_with(&function).compose_with(&return_edge);
                            self.statistics.end_summary_applications += 1;
                            // Propagate into every caller context
                            // that reached the call with this fact.
                            let caller_contexts: Vec<(P::Fact, EdgeFunction<P::EdgeFn>)> = self
                                .jump_functions
                                .reverse_lookup(*call, call_fact)
                                .into_iter()
                                .flatten()
                                .map(|(fact, jump)| (fact.clone(), jump.clone()))
                                .collect();
                            for (caller_fact, caller_function) in caller_contexts {
                                self.propagate(
                                    caller_fact,
                                    return_site,
                                    return_fact.clone(),
                                    caller_function.compose_with(&through_callee),
                                );
                            }
                        }
                    }
                }
            }

            // Returns past the seeds: the function has exits but was never
            // called during this solve, e.g. because the seeds sit below
            // the entry point of the program. Propagate the zero fact
            // into all call sites the call graph knows.
            if incoming.is_empty()
                && self.config.follow_returns_past_seeds
                && self.problem.is_zero_value(&edge.source_fact)
            {
                for call in self.cfg.callers_of(&callee.tid) {
                    let call_stmt = self.cfg.stmt(call);
                    for return_site in self.cfg.return_sites_of_call_at(call) {
                        let return_flow = {
                            let problem = &self.problem;
                            let cfg = self.cfg;
                            self.cache.ret(call, exit, return_site, || {
                                problem.get_return_flow_function(
                                    call_stmt,
                                    callee,
                                    exit_stmt,
                                    cfg.stmt(return_site),
                                )
                            })
                        };
                        for return_fact in return_flow.compute_targets(&edge.target_fact) {
                            let return_edge = self.problem.get_return_edge_function(
                                call_stmt,
                                callee,
                                exit_stmt,
                                &edge.target_fact,
                                self.cfg.stmt(return_site),
                                &return_fact,
                            );
                            self.unbalanced_return_sites.insert(return_site);
                            self.propagate(
                                self.zero.clone(),
                                return_site,
                                return_fact,
                                function.compose_with(&return_edge),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Phase 2: propagate seed values along the jump functions.
    /// Starts from scratch on every (re)entry.
    fn compute_values(&mut self, cancellation: &CancellationFlag) -> SolveStatus {
        self.values.clear();
        let mut worklist: VecDeque<(NodeIndex, P::Fact)> = VecDeque::new();
        let seeds = self.seeds.clone();
        for (node, fact) in seeds {
            self.set_value(node, fact, P::Value::bottom(), &mut worklist);
        }
        // Unbalanced return sites are reachable by construction.
        let unbalanced: Vec<NodeIndex> = self.unbalanced_return_sites.iter().copied().collect();
        for node in unbalanced {
            self.set_value(node, self.zero.clone(), P::Value::bottom(), &mut worklist);
        }

        // Propagate through start points and calls.
        while let Some((node, fact)) = worklist.pop_front() {
            if cancellation.is_cancelled() {
                self.logs.push(
                    LogMessage::new_info("Value computation was cancelled.").source("IDE solver"),
                );
                return SolveStatus::Interrupted;
            }
            let value = self
                .values
                .get(&node, &fact)
                .cloned()
                .expect("Queued value not found in the value table.");
            if self.cfg.is_start_point(node) || self.unbalanced_return_sites.contains(&node) {
                // Into the call sites of the containing function.
                for call in self.cfg.calls_from_within(&self.cfg.function_of(node).tid) {
                    let targets: Vec<(P::Fact, EdgeFunction<P::EdgeFn>)> = self
                        .jump_functions
                        .forward_lookup(&fact, call)
                        .into_iter()
                        .flatten()
                        .map(|(call_fact, jump)| (call_fact.clone(), jump.clone()))
                        .collect();
                    for (call_fact, jump) in targets {
                        let propagated = jump.compute_target(&value);
                        self.set_value(call, call_fact, propagated, &mut worklist);
                    }
                }
            }
            if self.cfg.is_call_site(node) {
                // Into the entry points of the callees.
                let call_stmt = self.cfg.stmt(node);
                for callee in self.cfg.callees_of_call_at(node) {
                    if self.problem.get_summary_flow_function(call_stmt, callee).is_some() {
                        // Summarized callees are never entered.
                        continue;
                    }
                    let call_flow = {
                        let problem = &self.problem;
                        self.cache.call(node, &callee.tid, || {
                            problem.get_call_flow_function(call_stmt, callee)
                        })
                    };
                    for entry in self.cfg.start_points_of(&callee.tid) {
                        for entry_fact in call_flow.compute_targets(&fact) {
                            let call_edge = self.problem.get_call_edge_function(
                                call_stmt,
                                &fact,
                                callee,
                                &entry_fact,
                            );
                            let propagated = call_edge.compute_target(&value);
                            self.set_value(entry, entry_fact, propagated, &mut worklist);
                        }
                    }
                }
            }
        }

        // Evaluate the jump functions at all remaining nodes.
        for node in self.cfg.all_non_call_start_nodes() {
            if cancellation.is_cancelled() {
                self.logs.push(
                    LogMessage::new_info("Value computation was cancelled.").source("IDE solver"),
                );
                return SolveStatus::Interrupted;
            }
            let function_tid = &self.cfg.function_of(node).tid;
            let mut sources = self.cfg.start_points_of(function_tid);
            sources.extend(
                self.unbalanced_return_sites
                    .iter()
                    .copied()
                    .filter(|site| self.cfg.function_of(*site).tid == *function_tid),
            );
            let triples: Vec<(P::Fact, P::Fact, EdgeFunction<P::EdgeFn>)> = self
                .jump_functions
                .lookup_by_target(node)
                .map(|(source_fact, target_fact, jump)| {
                    (source_fact.clone(), target_fact.clone(), jump.clone())
                })
                .collect();
            for source in sources {
                for (source_fact, target_fact, jump) in &triples {
                    let Some(source_value) = self.values.get(&source, source_fact).cloned() else {
                        // The context never became reachable.
                        continue;
                    };
                    let computed = jump.compute_target(&source_value);
                    self.join_value(node, target_fact.clone(), computed);
                }
            }
        }
        SolveStatus::Converged
    }

    fn set_value(
        &mut self,
        node: NodeIndex,
        fact: P::Fact,
        value: P::Value,
        worklist: &mut VecDeque<(NodeIndex, P::Fact)>,
    ) {
        if self.join_value(node, fact.clone(), value) {
            worklist.push_back((node, fact));
        }
    }

    /// Join a value into the table cell `(n, d)`.
    /// Returns `true` if the cell changed.
    /// The top element is the implicit value of absent cells
    /// and is never stored.
    fn join_value(&mut self, node: NodeIndex, fact: P::Fact, value: P::Value) -> bool {
        if value == self.problem.top_element() {
            return false;
        }
        let joined = match self.values.get(&node, &fact) {
            Some(existing) => {
                let joined = self.problem.join(existing, &value);
                if joined == *existing {
                    return false;
                }
                joined
            }
            None => value,
        };
        self.values.insert(node, fact.clone(), joined);
        self.statistics.value_updates += 1;
        if let Some(hook) = &mut self.result_hook {
            let stmt = self.cfg.stmt(node);
            let value = self
                .values
                .get(&node, &fact)
                .expect("The value was inserted above.");
            hook(stmt, &fact, value);
        }
        true
    }
}

/// The IFDS solver: runs an [`IfdsProblem`] through the IDE machinery
/// with identity edge functions over the binary reachability lattice.
pub struct IfdsSolver<'a, P: IfdsProblem> {
    solver: IdeSolver<'a, IfdsAsIde<P>>,
}

impl<'a, P: IfdsProblem> IfdsSolver<'a, P> {
    /// Create a solver for the given problem and submit its seeds.
    ///
    /// The value-computation phase is always enabled,
    /// reachability is read off the computed values.
    pub fn new(problem: P, cfg: &'a Cfg<'a>, config: SolverConfig) -> IfdsSolver<'a, P> {
        let config = SolverConfig {
            compute_values: true,
            ..config
        };
        IfdsSolver {
            solver: IdeSolver::new(IfdsAsIde(problem), cfg, config),
        }
    }

    /// Run the solve to completion.
    pub fn solve(&mut self) -> SolveStatus {
        self.solver.solve()
    }

    /// Run the solve until it converges or the given flag is raised.
    pub fn solve_interruptible(&mut self, cancellation: &CancellationFlag) -> SolveStatus {
        self.solver.solve_interruptible(cancellation)
    }

    /// The facts holding at the given node.
    /// `None` until the solve converged.
    pub fn results_at(&self, node: NodeIndex) -> Option<BTreeSet<P::Fact>> {
        let results = self.solver.results()?;
        Some(
            results
                .results_at(node)
                .into_iter()
                .flatten()
                .filter(|(_, value)| **value == BinaryDomain::Bottom)
                .map(|(fact, _)| fact.clone())
                .collect(),
        )
    }

    /// The problem the solver was constructed with.
    pub fn problem(&self) -> &P {
        &self.solver.problem().0
    }

    /// Counters describing the work done so far.
    pub fn statistics(&self) -> &SolverStatistics {
        self.solver.statistics()
    }

    /// The log messages generated so far.
    pub fn logs(&self) -> &[LogMessage] {
        self.solver.logs()
    }

    /// Return sites that were only reached by following a return
    /// past the seeds.
    pub fn unbalanced_return_sites(&self) -> &BTreeSet<NodeIndex> {
        self.solver.unbalanced_return_sites()
    }
}
