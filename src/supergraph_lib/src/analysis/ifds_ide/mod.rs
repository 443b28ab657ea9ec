//! Interprocedural dataflow analysis via IFDS/IDE tabulation.
//!
//! An analysis in this framework tracks a finite set of dataflow facts
//! through the interprocedural control flow graph.
//! Flow functions describe which facts hold after a statement
//! given a single fact holding before it;
//! because they are distributive, the solver can process each fact
//! in isolation and still compute the precise merge-over-all-valid-paths
//! solution. IDE problems additionally attach a value of a join lattice
//! to every reachable fact, transformed along the flows by edge functions.
//!
//! The solver summarizes each function once per entry fact
//! and reuses the summary at every call site,
//! which is what makes the approach scale to many calls
//! of the same function.
//! Procedure summaries respect the call/return structure of the program,
//! so impossible interprocedural paths do not pollute the results.
//!
//! ## Plugging in an analysis
//!
//! Implement [`IfdsProblem`] for pure reachability questions
//! ("which variables may be tainted here?")
//! or [`IdeProblem`] when each fact carries a computed value
//! ("which constant does this variable hold here?").
//! Then run the problem:
//!
//! - [`IfdsSolver`] computes the set of facts holding at each node.
//! - [`IdeSolver`] computes the value of each fact at each node,
//!   exposed as [`SolverResults`].
//!
//! Problems that are not distributive,
//! e.g. because their transfer functions inspect whole variable
//! environments, belong to the [`mono`](super::mono) framework instead.

pub mod cache;
pub mod edge_function;
pub mod flow_function;
pub mod jump_functions;
pub mod problem;
pub mod results;
pub mod solver;

pub use edge_function::{
    BinaryDomain, BinaryEdgeFunction, EdgeFunction, EdgeFunctionOps, JoinLattice,
};
pub use flow_function::FlowFunction;
pub use problem::{IdeProblem, IfdsAsIde, IfdsProblem, InitialSeeds, SolverConfig};
pub use results::SolverResults;
pub use solver::{IdeSolver, IfdsSolver, SolveStatus, SolverStatistics};
