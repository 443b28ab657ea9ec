//! Flow functions map a dataflow fact to the set of facts holding
//! after a statement.
//!
//! The common shapes (identity, kill, gen) are first-class variants,
//! so problems can describe most statements without allocating closures
//! and the solver can print meaningful debug representations.
//! Everything else goes through the [`FlowFunction::Lambda`] escape hatch.

use std::collections::BTreeSet;
use std::rc::Rc;

/// A distributive flow function over facts of type `D`.
///
/// Distributivity means that the function is fully described by its effect
/// on single facts; the solver never applies it to sets directly.
#[derive(Clone)]
pub enum FlowFunction<D> {
    /// Every fact flows to itself.
    Identity,
    /// No fact flows. Kills everything, including the zero fact.
    KillAll,
    /// The given fact is killed, all others flow to themselves.
    Kill(D),
    /// When `from` flows through the function, `fact` is generated alongside
    /// it. All facts flow to themselves.
    Gen {
        /// The newly generated fact.
        fact: D,
        /// The fact triggering the generation, usually the zero fact.
        from: D,
    },
    /// The union of several flow functions.
    Union(Vec<FlowFunction<D>>),
    /// An arbitrary fact-to-set mapping.
    Lambda(Rc<dyn Fn(&D) -> BTreeSet<D>>),
}

impl<D: Ord + Clone> FlowFunction<D> {
    /// Wrap a closure as a flow function.
    pub fn from_lambda(function: impl Fn(&D) -> BTreeSet<D> + 'static) -> FlowFunction<D> {
        FlowFunction::Lambda(Rc::new(function))
    }

    /// All facts holding after the statement if `fact` holds before it.
    pub fn compute_targets(&self, fact: &D) -> BTreeSet<D> {
        match self {
            FlowFunction::Identity => BTreeSet::from([fact.clone()]),
            FlowFunction::KillAll => BTreeSet::new(),
            FlowFunction::Kill(killed) => {
                if fact == killed {
                    BTreeSet::new()
                } else {
                    BTreeSet::from([fact.clone()])
                }
            }
            FlowFunction::Gen { fact: generated, from } => {
                if fact == from {
                    BTreeSet::from([fact.clone(), generated.clone()])
                } else {
                    BTreeSet::from([fact.clone()])
                }
            }
            FlowFunction::Union(functions) => functions
                .iter()
                .flat_map(|function| function.compute_targets(fact))
                .collect(),
            FlowFunction::Lambda(function) => function(fact),
        }
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for FlowFunction<D> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FlowFunction::Identity => write!(formatter, "Identity"),
            FlowFunction::KillAll => write!(formatter, "KillAll"),
            FlowFunction::Kill(fact) => write!(formatter, "Kill({fact:?})"),
            FlowFunction::Gen { fact, from } => write!(formatter, "Gen({fact:?} from {from:?})"),
            FlowFunction::Union(functions) => {
                formatter.debug_tuple("Union").field(functions).finish()
            }
            FlowFunction::Lambda(_) => write!(formatter, "Lambda(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_triggers_only_on_its_source_fact() {
        let gen = FlowFunction::Gen { fact: 7, from: 0 };
        assert_eq!(gen.compute_targets(&0), BTreeSet::from([0, 7]));
        assert_eq!(gen.compute_targets(&3), BTreeSet::from([3]));
    }

    #[test]
    fn kill_removes_exactly_its_fact() {
        let kill = FlowFunction::Kill(5);
        assert_eq!(kill.compute_targets(&5), BTreeSet::new());
        assert_eq!(kill.compute_targets(&2), BTreeSet::from([2]));
        assert_eq!(FlowFunction::<u32>::KillAll.compute_targets(&2), BTreeSet::new());
    }

    #[test]
    fn union_combines_the_target_sets() {
        let union = FlowFunction::Union(vec![
            FlowFunction::Gen { fact: 1, from: 0 },
            FlowFunction::Gen { fact: 2, from: 0 },
            FlowFunction::Kill(0),
        ]);
        // The kill branch contributes nothing for the zero fact,
        // but both gen branches keep it.
        assert_eq!(union.compute_targets(&0), BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn lambda_supports_arbitrary_mappings() {
        let swap = FlowFunction::from_lambda(|fact: &i32| BTreeSet::from([-fact]));
        assert_eq!(swap.compute_targets(&3), BTreeSet::from([-3]));
        assert!(format!("{swap:?}").contains("Lambda"));
    }
}
