//! The dataflow analysis engines and the infrastructure shared between them.
//!
//! The crate ships two engines:
//!
//! - [`ifds_ide`] implements IFDS/IDE summary-based tabulation on the
//!   exploded supergraph. Use it for distributive problems where procedure
//!   summaries should be computed once and reused at every call site.
//! - [`mono`] implements call-string-based monotone frameworks on top of the
//!   generic [`fixpoint`] engine. Use it for problems that are not
//!   distributive, at the price of bounded context sensitivity.
//!
//! Both engines run on the interprocedural control flow graph from [`graph`],
//! which in turn is wired according to a call graph from [`callgraph`].
//! Call-target resolution can consult the alias service from [`alias`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod alias;
pub mod callgraph;
pub mod fixpoint;
pub mod graph;
pub mod ifds_ide;
pub mod mono;

/// A shareable flag to request cancellation of a running computation.
///
/// The requesting side keeps one clone and calls [`cancel`](Self::cancel),
/// e.g. from a timeout thread or a signal handler.
/// Solvers poll the flag between worklist steps,
/// stop at the next poll after cancellation
/// and report that their result is not a fixpoint.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create a new, uncancelled flag.
    pub fn new() -> CancellationFlag {
        CancellationFlag::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Return `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
