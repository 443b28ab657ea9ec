/*!
The main library of supergraph, a framework for whole-program dataflow analysis.

# What is supergraph

supergraph computes how information flows through all execution paths of a
program, across function boundaries. Client code describes an analysis as a
*problem*: a set of dataflow facts, flow functions stating which facts hold
after each statement, and (for value-computing analyses) edge functions
describing how a lattice value is transformed along each flow. A generic
solver then computes the fixed point over the whole program, reusing a
summary of each function at every call site instead of reanalyzing its body.

The library works on its own small statement-level intermediate
representation. Frontends translating source code or binaries into this
representation are out of scope; the [`intermediate_representation`] module
documents the expected shape of input programs.

# Defining and running an analysis

An analysis run wires up the components in this order:

1. Build or deserialize a [`Program`](intermediate_representation::Program).
2. Resolve call targets into a [`CallGraph`](analysis::callgraph::CallGraph)
   using one of the [resolver strategies](analysis::callgraph::resolver):
   class hierarchy, rapid type or on-the-fly points-to resolution.
3. Build the interprocedural control flow graph
   ([`Cfg`](analysis::graph::Cfg)) from the program and the call graph.
4. Hand a problem and the graph to a solver:
   - [`IfdsSolver`](analysis::ifds_ide::IfdsSolver) answers reachability
     questions ("can a tainted value reach this statement?"),
   - [`IdeSolver`](analysis::ifds_ide::IdeSolver) computes a lattice value
     per reachable fact ("which constant does this variable hold here?"),
   - [`InterMonoSolver`](analysis::mono::InterMonoSolver) runs
     non-distributive problems with bounded call-string contexts.

Long-running solves can be cancelled through a
[`CancellationFlag`](analysis::CancellationFlag) and resumed later;
log messages and findings can be streamed off a worker thread with a
[`LogThread`](utils::log::LogThread).

The [`problems`] module contains two ready-made analyses that double as
usage examples: interprocedural linear constant propagation and a
configurable taint analysis. Their configuration structs deserialize from
JSON files, see [`utils::read_config_file`].

# Further documentation

The [`analysis::ifds_ide`] module documentation explains the tabulation
machinery shared by both solvers and when a problem fits the IFDS/IDE
framework; the [`analysis::mono`] documentation covers the call-string
alternative for problems that do not.
*/

pub mod analysis;
pub mod intermediate_representation;
pub mod problems;
pub mod utils;

mod prelude {
    pub use serde::{Deserialize, Serialize};

    pub use crate::intermediate_representation::{Term, Tid};
    pub use anyhow::{anyhow, Context, Error};
}
