//! This module defines the intermediate representation (IR) of programs
//! under analysis.
//!
//! The IR is deliberately small:
//! a [`Program`] is a set of [`Function`] terms,
//! a function body is a list of [`Stmt`] terms,
//! and statements operate on [`Expression`]s over named [`Variable`]s.
//! Every term carries a [`Tid`], a unique identifier used to refer to it
//! from analysis results, call graphs and log messages.
//!
//! Frontends that lift real binaries or source code into this IR are out of
//! scope for this crate.
//! The IR is rich enough to exercise every feature of the dataflow engines:
//! intraprocedural control flow, direct, indirect and virtual calls,
//! heap allocation sites and variadic functions.

mod expression;
mod function;
mod program;
mod stmt;
mod term;
mod variable;

pub use expression::*;
pub use function::*;
pub use program::*;
pub use stmt::*;
pub use term::*;
pub use variable::*;
