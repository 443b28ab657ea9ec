//! Ready-made dataflow analyses built on the engines of this crate.
//!
//! Each analysis doubles as a reference for writing new problems:
//! [`linear_constants`] shows a full IDE problem with its own
//! edge-function family, [`taint`] shows an IFDS reachability problem
//! with a serde-deserializable configuration and streamed findings.

pub mod linear_constants;
pub mod taint;

pub use linear_constants::LinearConstantAnalysis;
pub use taint::TaintAnalysis;
