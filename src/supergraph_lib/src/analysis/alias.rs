//! A lightweight, equality-based alias service.
//!
//! The service answers may-alias queries over abstract values:
//! function-local variables, heap allocation sites and function addresses.
//! Two values may alias if they are in the same equivalence class.
//! Classes are seeded flow-insensitively from the program
//! (direct assignments, allocations and taken function addresses)
//! and can be refined afterwards through [`AliasInfo::introduce_alias`],
//! e.g. by a call-graph builder that discovers
//! actual-to-formal parameter bindings on the fly.
//!
//! The equality-based model deliberately trades precision for simplicity.
//! Clients that need a stronger points-to analysis can provide their own
//! [`AliasInfo`] implementation.

use crate::intermediate_representation::*;
use crate::prelude::*;
use fnv::FnvHashMap;
use petgraph::unionfind::UnionFind;
use std::collections::BTreeSet;

/// A value that can be queried for aliasing.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum AbstractValue {
    /// A local variable of a function.
    Var {
        /// The term identifier of the function the variable belongs to.
        function: Tid,
        /// The variable itself.
        var: Variable,
    },
    /// A heap object, identified by the term identifier
    /// of the statement allocating it.
    AllocationSite(Tid),
    /// The address of a function.
    Function(Tid),
}

impl AbstractValue {
    /// Generate the abstract value of a local variable.
    pub fn var(function: &Tid, var: &Variable) -> AbstractValue {
        AbstractValue::Var {
            function: function.clone(),
            var: var.clone(),
        }
    }
}

/// The alias queries offered to analyses.
pub trait AliasInfo {
    /// The set of all values that may alias the given value,
    /// including the value itself.
    fn get_points_to_set(&self, value: &AbstractValue) -> BTreeSet<AbstractValue>;

    /// The allocation sites whose objects the given value may point to.
    fn get_reachable_allocation_sites(&self, value: &AbstractValue) -> BTreeSet<Tid>;

    /// Record that two values may alias each other.
    fn introduce_alias(&mut self, first: &AbstractValue, second: &AbstractValue);

    /// Return `true` if the two values may alias each other.
    fn may_alias(&self, first: &AbstractValue, second: &AbstractValue) -> bool;
}

/// Equivalence classes of abstract values, the default [`AliasInfo`] provider.
///
/// The universe of values is fixed at construction time
/// since the program is immutable during analysis.
/// Queries for values outside the universe fall back to equality.
pub struct AliasSets {
    /// All abstract values of the program, indexed by their interned ID.
    values: Vec<AbstractValue>,
    /// The interned ID of each abstract value.
    ids: FnvHashMap<AbstractValue, usize>,
    /// The union-find structure holding the equivalence classes.
    sets: UnionFind<usize>,
}

impl AliasSets {
    /// Compute the initial equivalence classes of a program.
    ///
    /// Seeds one union per variable-to-variable assignment,
    /// per allocation and per taken function address.
    /// Parameter passing is not seeded here;
    /// it is introduced by call-graph construction once call targets are known.
    pub fn from_program(program: &Program) -> AliasSets {
        let mut values = Vec::new();
        let mut ids = FnvHashMap::default();
        for function in &program.functions {
            intern(
                &mut values,
                &mut ids,
                AbstractValue::Function(function.tid.clone()),
            );
            for param in &function.term.formal_params {
                intern(&mut values, &mut ids, AbstractValue::var(&function.tid, param));
            }
            for stmt in &function.term.statements {
                if let Some(var) = stmt.term.defined_variable() {
                    intern(&mut values, &mut ids, AbstractValue::var(&function.tid, var));
                }
                for var in stmt.term.used_variables() {
                    intern(&mut values, &mut ids, AbstractValue::var(&function.tid, var));
                }
                if let Stmt::New { .. } = &stmt.term {
                    intern(
                        &mut values,
                        &mut ids,
                        AbstractValue::AllocationSite(stmt.tid.clone()),
                    );
                }
            }
        }
        let mut alias_sets = AliasSets {
            sets: UnionFind::new(values.len()),
            values,
            ids,
        };
        for (function, stmt) in program.all_statements() {
            match &stmt.term {
                Stmt::Assign { var, value } => {
                    if let Some(rhs) = value.as_var() {
                        alias_sets.introduce_alias(
                            &AbstractValue::var(&function.tid, var),
                            &AbstractValue::var(&function.tid, rhs),
                        );
                    }
                    for name in value.referenced_functions() {
                        if let Some(target) = program.get_function(name) {
                            alias_sets.introduce_alias(
                                &AbstractValue::var(&function.tid, var),
                                &AbstractValue::Function(target.tid.clone()),
                            );
                        }
                    }
                }
                Stmt::New { var, .. } => {
                    alias_sets.introduce_alias(
                        &AbstractValue::var(&function.tid, var),
                        &AbstractValue::AllocationSite(stmt.tid.clone()),
                    );
                }
                _ => (),
            }
        }
        alias_sets
    }

}

impl AliasInfo for AliasSets {
    fn get_points_to_set(&self, value: &AbstractValue) -> BTreeSet<AbstractValue> {
        let Some(&id) = self.ids.get(value) else {
            return BTreeSet::from([value.clone()]);
        };
        let representative = self.sets.find(id);
        self.values
            .iter()
            .enumerate()
            .filter(|(other, _)| self.sets.find(*other) == representative)
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn get_reachable_allocation_sites(&self, value: &AbstractValue) -> BTreeSet<Tid> {
        self.get_points_to_set(value)
            .into_iter()
            .filter_map(|value| match value {
                AbstractValue::AllocationSite(tid) => Some(tid),
                _ => None,
            })
            .collect()
    }

    fn introduce_alias(&mut self, first: &AbstractValue, second: &AbstractValue) {
        // Values outside the program universe cannot be merged.
        if let (Some(&first), Some(&second)) = (self.ids.get(first), self.ids.get(second)) {
            self.sets.union(first, second);
        }
    }

    fn may_alias(&self, first: &AbstractValue, second: &AbstractValue) -> bool {
        match (self.ids.get(first), self.ids.get(second)) {
            (Some(&first), Some(&second)) => self.sets.equiv(first, second),
            _ => first == second,
        }
    }
}

/// Intern an abstract value, assigning it the next free ID.
fn intern(
    values: &mut Vec<AbstractValue>,
    ids: &mut FnvHashMap<AbstractValue, usize>,
    value: AbstractValue,
) {
    if !ids.contains_key(&value) {
        ids.insert(value.clone(), values.len());
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_chains_share_allocation_sites() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_new("site", "x", "Widget"),
                Stmt::mock_assign("a1", "y", Expression::Var(Variable::new("x"))),
                Stmt::mock_assign("a2", "z", Expression::Var(Variable::new("y"))),
                Stmt::mock_assign("a3", "w", Expression::Const(42)),
            ],
        )]);
        let alias_sets = AliasSets::from_program(&program);
        let main_tid = Tid::new("fn_main");
        let x = AbstractValue::var(&main_tid, &Variable::new("x"));
        let z = AbstractValue::var(&main_tid, &Variable::new("z"));
        let w = AbstractValue::var(&main_tid, &Variable::new("w"));

        assert!(alias_sets.may_alias(&x, &z));
        assert!(!alias_sets.may_alias(&x, &w));
        assert_eq!(
            alias_sets.get_reachable_allocation_sites(&z),
            BTreeSet::from([Tid::new("site")])
        );
        assert_eq!(program.allocation_class(&Tid::new("site")), Some("Widget"));
    }

    #[test]
    fn taken_function_addresses_are_tracked() {
        let program = Program::mock(vec![
            Function::mock_with_stmts(
                "main",
                &[],
                vec![Stmt::mock_assign(
                    "a1",
                    "fptr",
                    Expression::FunctionRef("callee".to_string()),
                )],
            ),
            Function::mock("callee", &["p"]),
        ]);
        let alias_sets = AliasSets::from_program(&program);
        let fptr = AbstractValue::var(&Tid::new("fn_main"), &Variable::new("fptr"));
        assert!(alias_sets
            .get_points_to_set(&fptr)
            .contains(&AbstractValue::Function(Tid::new("fn_callee"))));
    }

    #[test]
    fn introduced_aliases_cross_function_boundaries() {
        let program = Program::mock(vec![
            Function::mock_with_stmts(
                "caller",
                &[],
                vec![
                    Stmt::mock_new("site", "obj", "Widget"),
                    Stmt::mock_call("call", "callee", vec![Expression::Var(Variable::new("obj"))], None),
                ],
            ),
            Function::mock_with_stmts("callee", &["p"], vec![Stmt::mock_return("ret", None)]),
        ]);
        let mut alias_sets = AliasSets::from_program(&program);
        let obj = AbstractValue::var(&Tid::new("fn_caller"), &Variable::new("obj"));
        let param = AbstractValue::var(&Tid::new("fn_callee"), &Variable::new("p"));

        assert!(!alias_sets.may_alias(&obj, &param));
        alias_sets.introduce_alias(&obj, &param);
        assert!(alias_sets.may_alias(&obj, &param));
        assert_eq!(
            alias_sets.get_reachable_allocation_sites(&param),
            BTreeSet::from([Tid::new("site")])
        );
    }

    #[test]
    fn unknown_values_fall_back_to_equality() {
        let program = Program::mock(Vec::new());
        let alias_sets = AliasSets::from_program(&program);
        let ghost = AbstractValue::AllocationSite(Tid::new("nowhere"));
        assert!(alias_sets.may_alias(&ghost, &ghost));
        assert_eq!(
            alias_sets.get_points_to_set(&ghost),
            BTreeSet::from([ghost.clone()])
        );
    }
}
