//! Edge functions describe how lattice values transform
//! along edges of the exploded supergraph.
//!
//! Every problem brings its own family of edge functions as a type
//! implementing [`EdgeFunctionOps`].
//! The framework wraps that family into [`EdgeFunction`],
//! which adds the three members every problem needs:
//! the identity function and the constant functions to top and to bottom.
//! Keeping the wrapper a plain enum lets the solver
//! normalize compositions and joins against the three built-ins eagerly,
//! without consulting the problem and without heap allocation.
//!
//! ## Algebra requirements
//!
//! The solver composes and joins edge functions while building jump
//! functions, so the problem's family must be closed under both operations
//! up to the built-ins. Two assumptions are baked into the normalization
//! rules and must hold for all problem edge functions `f`:
//! `f(top) = top` and `f(bottom) = bottom`.
//! Problems whose functions violate this
//! must model the offending behavior as explicit function variants
//! instead of relying on the built-ins.

use crate::prelude::*;

/// A bounded join-semilattice of values computed by an IDE analysis.
///
/// The join must satisfy `join(top, v) = v` and `join(bottom, v) = bottom`,
/// i.e. top is the neutral element and bottom absorbs.
/// Top means "no information has arrived yet",
/// bottom means "too many conflicting values".
pub trait JoinLattice: PartialEq + Eq + Clone + std::fmt::Debug {
    /// The neutral element of the join.
    fn top() -> Self;
    /// The absorbing element of the join.
    fn bottom() -> Self;
    /// Compute the join of two values.
    fn join(&self, other: &Self) -> Self;
}

/// The problem-specific part of an edge-function family.
///
/// Composition and join return `None` if the family is not closed
/// for the given pair; the solver treats that as a fatal problem bug.
/// The default join collapses distinct functions to the constant-bottom
/// function. This is always sound. Problems with a more precise join,
/// e.g. pointwise joinable function families, should override it.
pub trait EdgeFunctionOps: PartialEq + Eq + Clone + std::fmt::Debug + Sized {
    /// The value lattice the functions operate on.
    type Value: JoinLattice;

    /// Evaluate the function on a source value.
    fn compute_target(&self, source: &Self::Value) -> Self::Value;

    /// Compose with a second function that is applied after `self`.
    fn compose_with(&self, second: &Self) -> Option<EdgeFunction<Self>>;

    /// Compute the pointwise join with another function.
    fn join_with(&self, _other: &Self) -> Option<EdgeFunction<Self>> {
        Some(EdgeFunction::AllBottom)
    }
}

/// An edge function of the exploded supergraph:
/// one of the three built-ins or a problem-specific function.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EdgeFunction<F: EdgeFunctionOps> {
    /// The identity function.
    Identity,
    /// The constant function to the top element.
    /// Also the implicit jump function of all unreachable node/fact pairs.
    AllTop,
    /// The constant function to the bottom element.
    AllBottom,
    /// A function from the problem's family.
    Problem(F),
}

impl<F: EdgeFunctionOps> EdgeFunction<F> {
    /// Evaluate the function on a source value.
    pub fn compute_target(&self, source: &F::Value) -> F::Value {
        match self {
            EdgeFunction::Identity => source.clone(),
            EdgeFunction::AllTop => F::Value::top(),
            EdgeFunction::AllBottom => F::Value::bottom(),
            EdgeFunction::Problem(function) => function.compute_target(source),
        }
    }

    /// Compose with a second function that is applied after `self`.
    ///
    /// Compositions involving the built-ins are normalized here;
    /// only pairs of problem functions are delegated to the problem.
    /// Panics if the problem's family is not closed under composition.
    pub fn compose_with(&self, second: &EdgeFunction<F>) -> EdgeFunction<F> {
        match (self, second) {
            (_, EdgeFunction::Identity) => self.clone(),
            (EdgeFunction::Identity, _) => second.clone(),
            // A constant second function wins outright.
            (_, EdgeFunction::AllBottom) => EdgeFunction::AllBottom,
            (_, EdgeFunction::AllTop) => EdgeFunction::AllTop,
            // Top- and bottom-preservation of problem functions.
            (EdgeFunction::AllTop, _) => EdgeFunction::AllTop,
            (EdgeFunction::AllBottom, _) => EdgeFunction::AllBottom,
            (EdgeFunction::Problem(first), EdgeFunction::Problem(second)) => {
                match first.compose_with(second) {
                    Some(composed) => composed,
                    None => panic!(
                        "The edge functions {first:?} and {second:?} do not compose. \
                         The edge-function family of the problem is not closed under composition."
                    ),
                }
            }
        }
    }

    /// Compute the pointwise join with another edge function.
    ///
    /// Panics if the problem family returns no result for a join
    /// of two of its functions.
    pub fn join_with(&self, other: &EdgeFunction<F>) -> EdgeFunction<F> {
        match (self, other) {
            _ if self == other => self.clone(),
            (EdgeFunction::AllTop, _) => other.clone(),
            (_, EdgeFunction::AllTop) => self.clone(),
            (EdgeFunction::AllBottom, _) | (_, EdgeFunction::AllBottom) => EdgeFunction::AllBottom,
            (EdgeFunction::Problem(first), EdgeFunction::Problem(second)) => {
                match first.join_with(second) {
                    Some(joined) => joined,
                    None => panic!(
                        "The edge functions {first:?} and {second:?} have no declared join."
                    ),
                }
            }
            // Identity joined with a problem function:
            // collapsing to constant bottom is always sound.
            _ => EdgeFunction::AllBottom,
        }
    }

    /// Return `true` for the constant-top function.
    pub fn is_all_top(&self) -> bool {
        matches!(self, EdgeFunction::AllTop)
    }
}

/// The value lattice of IFDS problems run through the IDE machinery:
/// a fact is either reachable (bottom) or unreachable (top).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum BinaryDomain {
    /// The fact is not reachable.
    Top,
    /// The fact is reachable.
    Bottom,
}

impl JoinLattice for BinaryDomain {
    fn top() -> Self {
        BinaryDomain::Top
    }

    fn bottom() -> Self {
        BinaryDomain::Bottom
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (BinaryDomain::Top, BinaryDomain::Top) => BinaryDomain::Top,
            _ => BinaryDomain::Bottom,
        }
    }
}

/// The (empty) edge-function family of binary IFDS problems.
///
/// Reachability only needs the built-in edge functions,
/// so this family has no members.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryEdgeFunction {}

impl EdgeFunctionOps for BinaryEdgeFunction {
    type Value = BinaryDomain;

    fn compute_target(&self, _source: &BinaryDomain) -> BinaryDomain {
        match *self {}
    }

    fn compose_with(&self, _second: &Self) -> Option<EdgeFunction<Self>> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Integers lifted with a top and a bottom element.
    #[derive(Debug, PartialEq, Eq, Clone)]
    enum Lifted {
        Top,
        Num(i64),
        Bottom,
    }

    impl JoinLattice for Lifted {
        fn top() -> Self {
            Lifted::Top
        }

        fn bottom() -> Self {
            Lifted::Bottom
        }

        fn join(&self, other: &Self) -> Self {
            match (self, other) {
                (Lifted::Top, value) | (value, Lifted::Top) => value.clone(),
                (Lifted::Num(first), Lifted::Num(second)) if first == second => self.clone(),
                _ => Lifted::Bottom,
            }
        }
    }

    /// Adds a constant, preserving top and bottom.
    #[derive(Debug, PartialEq, Eq, Clone)]
    struct AddConst(i64);

    impl EdgeFunctionOps for AddConst {
        type Value = Lifted;

        fn compute_target(&self, source: &Lifted) -> Lifted {
            match source {
                Lifted::Num(value) => Lifted::Num(value.wrapping_add(self.0)),
                lifted => lifted.clone(),
            }
        }

        fn compose_with(&self, second: &Self) -> Option<EdgeFunction<Self>> {
            Some(EdgeFunction::Problem(AddConst(self.0.wrapping_add(second.0))))
        }
    }

    /// A family that refuses to compose, for testing the fatal path.
    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Opaque;

    impl EdgeFunctionOps for Opaque {
        type Value = Lifted;

        fn compute_target(&self, source: &Lifted) -> Lifted {
            source.clone()
        }

        fn compose_with(&self, _second: &Self) -> Option<EdgeFunction<Self>> {
            None
        }
    }

    #[test]
    fn composition_normalizes_against_the_built_ins() {
        type F = EdgeFunction<AddConst>;
        let plus_two: F = EdgeFunction::Problem(AddConst(2));

        assert_eq!(plus_two.compose_with(&EdgeFunction::Identity), plus_two);
        assert_eq!(EdgeFunction::Identity.compose_with(&plus_two), plus_two);
        assert_eq!(plus_two.compose_with(&EdgeFunction::AllTop), F::AllTop);
        assert_eq!(plus_two.compose_with(&EdgeFunction::AllBottom), F::AllBottom);
        assert_eq!(F::AllTop.compose_with(&plus_two), F::AllTop);
        assert_eq!(F::AllBottom.compose_with(&plus_two), F::AllBottom);
        // A constant second function wins over a constant first function.
        assert_eq!(F::AllTop.compose_with(&F::AllBottom), F::AllBottom);
        assert_eq!(F::AllBottom.compose_with(&F::AllTop), F::AllTop);
        // Only problem/problem pairs reach the problem's algebra.
        assert_eq!(
            plus_two.compose_with(&EdgeFunction::Problem(AddConst(3))),
            EdgeFunction::Problem(AddConst(5))
        );
    }

    #[test]
    fn join_treats_top_as_neutral_and_bottom_as_absorbing() {
        type F = EdgeFunction<AddConst>;
        let plus_two: F = EdgeFunction::Problem(AddConst(2));

        assert_eq!(F::AllTop.join_with(&plus_two), plus_two);
        assert_eq!(plus_two.join_with(&F::AllTop), plus_two);
        assert_eq!(F::AllBottom.join_with(&plus_two), F::AllBottom);
        assert_eq!(plus_two.join_with(&F::AllBottom), F::AllBottom);
        assert_eq!(plus_two.join_with(&plus_two), plus_two);
        // The default problem join collapses distinct functions.
        assert_eq!(
            plus_two.join_with(&EdgeFunction::Problem(AddConst(3))),
            F::AllBottom
        );
        // So does a join of identity with a problem function.
        assert_eq!(F::Identity.join_with(&plus_two), F::AllBottom);
    }

    #[test]
    fn evaluation_respects_the_built_in_semantics() {
        type F = EdgeFunction<AddConst>;
        assert_eq!(F::Identity.compute_target(&Lifted::Num(3)), Lifted::Num(3));
        assert_eq!(F::AllTop.compute_target(&Lifted::Num(3)), Lifted::Top);
        assert_eq!(F::AllBottom.compute_target(&Lifted::Num(3)), Lifted::Bottom);
        assert_eq!(
            EdgeFunction::Problem(AddConst(4)).compute_target(&Lifted::Num(3)),
            Lifted::Num(7)
        );
        assert_eq!(
            EdgeFunction::Problem(AddConst(4)).compute_target(&Lifted::Top),
            Lifted::Top
        );
    }

    #[test]
    #[should_panic(expected = "not closed under composition")]
    fn refusing_to_compose_is_fatal() {
        let first = EdgeFunction::Problem(Opaque);
        let second = EdgeFunction::Problem(Opaque);
        let _ = first.compose_with(&second);
    }

    #[test]
    fn binary_domain_models_reachability() {
        assert_eq!(
            BinaryDomain::Top.join(&BinaryDomain::Bottom),
            BinaryDomain::Bottom
        );
        assert_eq!(BinaryDomain::top().join(&BinaryDomain::top()), BinaryDomain::Top);
        let reach: EdgeFunction<BinaryEdgeFunction> = EdgeFunction::AllBottom;
        assert_eq!(reach.compute_target(&BinaryDomain::Top), BinaryDomain::Bottom);
    }
}
