//! Strategies for computing the possible targets of call statements.
//!
//! Direct calls resolve to the named function under every strategy.
//! The strategies differ in how they handle virtual and indirect calls:
//!
//! - [`ClassHierarchyResolver`] (CHA) resolves a virtual call to the
//!   implementations in the static receiver class and all its subclasses.
//! - [`RapidTypeResolver`] (RTA) additionally restricts the receiver classes
//!   to those actually instantiated somewhere in the program.
//! - [`OnTheFlyResolver`] (OTF) resolves receiver objects and function
//!   pointers through an [`AliasInfo`] service and refines that service with
//!   the parameter and return-value bindings of each call it resolves.
//!   Since refined alias information can make further calls resolvable,
//!   OTF resolution and call-graph construction are interleaved
//!   (see [`CallGraph::build`](super::CallGraph::build)).

use crate::analysis::alias::{AbstractValue, AliasInfo};
use crate::intermediate_representation::*;
use std::collections::BTreeSet;

/// A strategy for resolving the callees of call statements.
pub trait CallTargetResolver {
    /// A short name identifying the strategy in log messages.
    fn name(&self) -> &'static str;

    /// Compute the term identifiers of all functions
    /// that the given call statement may invoke.
    ///
    /// An empty result marks the call as unresolved.
    /// Panics if `call` is not a call statement.
    fn resolve(
        &mut self,
        program: &Program,
        caller: &Term<Function>,
        call: &Term<Stmt>,
    ) -> BTreeSet<Tid>;
}

/// Class-hierarchy-analysis resolution.
pub struct ClassHierarchyResolver;

impl CallTargetResolver for ClassHierarchyResolver {
    fn name(&self) -> &'static str {
        "CHA"
    }

    fn resolve(
        &mut self,
        program: &Program,
        _caller: &Term<Function>,
        call: &Term<Stmt>,
    ) -> BTreeSet<Tid> {
        match call_target(call) {
            CallTarget::Direct(name) => resolve_direct(program, name),
            CallTarget::Virtual { class, slot, .. } => {
                resolve_in_hierarchy(program, class, *slot, None)
            }
            CallTarget::Indirect(expr) => resolve_referenced_functions(program, expr),
        }
    }
}

/// Rapid-type-analysis resolution.
///
/// The set of instantiated classes is computed lazily on the first
/// virtual call and reused afterwards.
#[derive(Default)]
pub struct RapidTypeResolver {
    instantiated_classes: Option<BTreeSet<String>>,
}

impl RapidTypeResolver {
    /// Create a new RTA resolver.
    pub fn new() -> RapidTypeResolver {
        RapidTypeResolver::default()
    }
}

impl CallTargetResolver for RapidTypeResolver {
    fn name(&self) -> &'static str {
        "RTA"
    }

    fn resolve(
        &mut self,
        program: &Program,
        _caller: &Term<Function>,
        call: &Term<Stmt>,
    ) -> BTreeSet<Tid> {
        match call_target(call) {
            CallTarget::Direct(name) => resolve_direct(program, name),
            CallTarget::Virtual { class, slot, .. } => {
                let instantiated = self.instantiated_classes.get_or_insert_with(|| {
                    program
                        .instantiated_classes()
                        .into_iter()
                        .map(|class| class.to_string())
                        .collect()
                });
                resolve_in_hierarchy(program, class, *slot, Some(instantiated))
            }
            CallTarget::Indirect(expr) => resolve_referenced_functions(program, expr),
        }
    }
}

/// On-the-fly resolution driven by alias information.
pub struct OnTheFlyResolver<A: AliasInfo> {
    /// The alias service queried for receivers and function pointers
    /// and refined with the bindings of every resolved call.
    pub alias_info: A,
}

impl<A: AliasInfo> OnTheFlyResolver<A> {
    /// Create a new OTF resolver around the given alias service.
    pub fn new(alias_info: A) -> OnTheFlyResolver<A> {
        OnTheFlyResolver { alias_info }
    }

    /// Candidate callees before the argument consistency check.
    fn candidates(
        &self,
        program: &Program,
        caller: &Term<Function>,
        call: &Term<Stmt>,
    ) -> BTreeSet<Tid> {
        match call_target(call) {
            CallTarget::Direct(name) => resolve_direct(program, name),
            CallTarget::Virtual { receiver, slot, .. } => {
                let receiver_value = AbstractValue::var(&caller.tid, receiver);
                let mut targets = BTreeSet::new();
                for site in self.alias_info.get_reachable_allocation_sites(&receiver_value) {
                    if let Some(class) = program.allocation_class(&site) {
                        if let Some(method) = program.vtable_entry(class, *slot) {
                            targets.extend(resolve_direct(program, method));
                        }
                    }
                }
                targets
            }
            CallTarget::Indirect(expr) => {
                let mut targets = resolve_referenced_functions(program, expr);
                if let Some(var) = expr.as_var() {
                    let pointer_value = AbstractValue::var(&caller.tid, var);
                    for value in self.alias_info.get_points_to_set(&pointer_value) {
                        if let AbstractValue::Function(tid) = value {
                            targets.insert(tid);
                        }
                    }
                }
                targets
            }
        }
    }

    /// Alias the actuals of a resolved call with the formals of its callee
    /// and the return variable with the returned values.
    fn bind_parameters(
        &mut self,
        program: &Program,
        caller: &Term<Function>,
        call: &Term<Stmt>,
        callee: &Term<Function>,
        actuals: &[Expression],
    ) {
        for (actual, formal) in callee.term.match_parameters(actuals) {
            let formal_value = AbstractValue::var(&callee.tid, &formal);
            if let Some(var) = actual.as_var() {
                self.alias_info
                    .introduce_alias(&AbstractValue::var(&caller.tid, var), &formal_value);
            }
            for name in actual.referenced_functions() {
                if let Some(function) = program.get_function(name) {
                    self.alias_info
                        .introduce_alias(&AbstractValue::Function(function.tid.clone()), &formal_value);
                }
            }
        }
        if let Stmt::Call {
            return_var: Some(return_var),
            ..
        } = &call.term
        {
            let return_value = AbstractValue::var(&caller.tid, return_var);
            for exit in callee.term.exit_points() {
                if let Stmt::Return { value: Some(value) } = &exit.term {
                    if let Some(var) = value.as_var() {
                        self.alias_info
                            .introduce_alias(&return_value, &AbstractValue::var(&callee.tid, var));
                    }
                }
            }
        }
    }
}

impl<A: AliasInfo> CallTargetResolver for OnTheFlyResolver<A> {
    fn name(&self) -> &'static str {
        "OTF"
    }

    fn resolve(
        &mut self,
        program: &Program,
        caller: &Term<Function>,
        call: &Term<Stmt>,
    ) -> BTreeSet<Tid> {
        let candidates = self.candidates(program, caller, call);
        let actuals = actual_arguments(call);
        // Direct calls are taken at face value even if the arity is off.
        let check_consistency = !matches!(call_target(call), CallTarget::Direct(_));
        let mut resolved = BTreeSet::new();
        for tid in candidates {
            let Some(callee) = program.get_function_by_tid(&tid) else {
                continue;
            };
            if check_consistency && !is_consistent_call(&callee.term, actuals.len()) {
                continue;
            }
            self.bind_parameters(program, caller, call, callee, &actuals);
            resolved.insert(tid);
        }
        resolved
    }
}

/// Return `true` if a function accepting the given number of arguments
/// can be the callee of the call.
pub fn is_consistent_call(callee: &Function, argument_count: usize) -> bool {
    argument_count == callee.formal_params.len()
        || (callee.is_vararg && argument_count >= callee.formal_params.len())
}

/// The target of a call statement.
/// Panics if the statement is not a call.
fn call_target(call: &Term<Stmt>) -> &CallTarget {
    match &call.term {
        Stmt::Call { target, .. } => target,
        _ => panic!("Call target resolution applied to a statement that is not a call."),
    }
}

/// The actual arguments of a call.
/// For virtual calls the receiver is passed as the first argument.
fn actual_arguments(call: &Term<Stmt>) -> Vec<Expression> {
    match &call.term {
        Stmt::Call { target, args, .. } => match target {
            CallTarget::Virtual { receiver, .. } => std::iter::once(Expression::Var(receiver.clone()))
                .chain(args.iter().cloned())
                .collect(),
            _ => args.clone(),
        },
        _ => panic!("Call target resolution applied to a statement that is not a call."),
    }
}

fn resolve_direct(program: &Program, name: &str) -> BTreeSet<Tid> {
    program
        .get_function(name)
        .map(|function| BTreeSet::from([function.tid.clone()]))
        .unwrap_or_default()
}

/// All functions whose addresses occur directly in the given expression.
fn resolve_referenced_functions(program: &Program, expr: &Expression) -> BTreeSet<Tid> {
    expr.referenced_functions()
        .into_iter()
        .flat_map(|name| resolve_direct(program, name))
        .collect()
}

/// Walk the class hierarchy downwards from `class`
/// and collect the implementations of the given vtable slot.
fn resolve_in_hierarchy(
    program: &Program,
    class: &str,
    slot: usize,
    instantiated: Option<&BTreeSet<String>>,
) -> BTreeSet<Tid> {
    let mut targets = BTreeSet::new();
    for candidate in program.class_and_subclasses(class) {
        if let Some(instantiated) = instantiated {
            if !instantiated.contains(&candidate.name) {
                continue;
            }
        }
        if let Some(method) = program.vtable_entry(&candidate.name, slot) {
            targets.extend(resolve_direct(program, method));
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::alias::AliasSets;

    fn hierarchy_program() -> Program {
        Program::mock_with_classes(
            vec![
                Function::mock("Base::run", &["this"]),
                Function::mock("Derived::run", &["this"]),
                Function::mock_with_stmts(
                    "main",
                    &[],
                    vec![
                        Stmt::mock_new("site", "obj", "Base"),
                        Stmt::mock_call_virtual("call", "obj", "Base", 0, Vec::new(), None),
                    ],
                ),
            ],
            vec![
                ClassDef::mock("Base", None, &["Base::run"]),
                ClassDef::mock("Derived", Some("Base"), &["Derived::run"]),
            ],
        )
    }

    fn call_site<'a>(program: &'a Program, function: &str, tid: &str) -> (&'a Term<Function>, &'a Term<Stmt>) {
        let caller = program.get_function(function).unwrap();
        let call = caller
            .term
            .statements
            .iter()
            .find(|stmt| stmt.tid == Tid::new(tid))
            .unwrap();
        (caller, call)
    }

    #[test]
    fn direct_calls_resolve_to_the_named_function() {
        let program = Program::mock(vec![
            Function::mock("callee", &[]),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![Stmt::mock_call("call", "callee", Vec::new(), None)],
            ),
        ]);
        let (caller, call) = call_site(&program, "main", "call");
        let mut resolver = ClassHierarchyResolver;
        assert_eq!(
            resolver.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_callee")])
        );
    }

    #[test]
    fn cha_takes_all_overrides_but_rta_only_instantiated_ones() {
        let program = hierarchy_program();
        let (caller, call) = call_site(&program, "main", "call");

        let mut cha = ClassHierarchyResolver;
        assert_eq!(
            cha.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_Base::run"), Tid::new("fn_Derived::run")])
        );
        // Only `Base` is ever instantiated.
        let mut rta = RapidTypeResolver::new();
        assert_eq!(
            rta.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_Base::run")])
        );
    }

    #[test]
    fn otf_resolves_virtual_calls_by_allocation_class() {
        let program = Program::mock_with_classes(
            vec![
                Function::mock("Base::run", &["this"]),
                Function::mock("Derived::run", &["this"]),
                Function::mock_with_stmts(
                    "main",
                    &[],
                    vec![
                        Stmt::mock_new("site", "obj", "Derived"),
                        Stmt::mock_call_virtual("call", "obj", "Base", 0, Vec::new(), None),
                    ],
                ),
            ],
            vec![
                ClassDef::mock("Base", None, &["Base::run"]),
                ClassDef::mock("Derived", Some("Base"), &["Derived::run"]),
            ],
        );
        let (caller, call) = call_site(&program, "main", "call");
        let mut otf = OnTheFlyResolver::new(AliasSets::from_program(&program));
        // The receiver points to a `Derived` object, so the static
        // class `Base` plays no role in the resolution.
        assert_eq!(
            otf.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_Derived::run")])
        );
    }

    #[test]
    fn otf_resolves_function_pointers_where_cha_cannot() {
        let program = Program::mock(vec![
            Function::mock("handler", &[]),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![
                    Stmt::mock_assign(
                        "a1",
                        "fptr",
                        Expression::FunctionRef("handler".to_string()),
                    ),
                    Stmt::mock_call_indirect(
                        "call",
                        Expression::Var(Variable::new("fptr")),
                        Vec::new(),
                        None,
                    ),
                ],
            ),
        ]);
        let (caller, call) = call_site(&program, "main", "call");

        let mut cha = ClassHierarchyResolver;
        assert!(cha.resolve(&program, caller, call).is_empty());

        let mut otf = OnTheFlyResolver::new(AliasSets::from_program(&program));
        assert_eq!(
            otf.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_handler")])
        );
    }

    #[test]
    fn otf_discovers_targets_through_parameter_bindings() {
        let program = Program::mock(vec![
            Function::mock("handler", &[]),
            Function::mock_with_stmts(
                "dispatch",
                &["callback"],
                vec![Stmt::mock_call_indirect(
                    "invoke",
                    Expression::Var(Variable::new("callback")),
                    Vec::new(),
                    None,
                )],
            ),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![Stmt::mock_call(
                    "call",
                    "dispatch",
                    vec![Expression::FunctionRef("handler".to_string())],
                    None,
                )],
            ),
        ]);
        let mut otf = OnTheFlyResolver::new(AliasSets::from_program(&program));

        // Before the call to `dispatch` is resolved
        // nothing is known about its `callback` parameter.
        let (dispatch, invoke) = call_site(&program, "dispatch", "invoke");
        assert!(otf.resolve(&program, dispatch, invoke).is_empty());

        // Resolving the direct call binds `&handler` to `callback`.
        let (main, call) = call_site(&program, "main", "call");
        assert_eq!(
            otf.resolve(&program, main, call),
            BTreeSet::from([Tid::new("fn_dispatch")])
        );
        assert_eq!(
            otf.resolve(&program, dispatch, invoke),
            BTreeSet::from([Tid::new("fn_handler")])
        );
    }

    #[test]
    fn otf_filters_targets_with_inconsistent_arity() {
        let program = Program::mock(vec![
            Function::mock("unary", &["a"]),
            Function::mock("binary", &["a", "b"]),
            Function::mock_vararg("variadic", &["fmt"], Vec::new()),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![
                    Stmt::mock_assign("a1", "fptr", Expression::FunctionRef("unary".to_string())),
                    Stmt::mock_assign("a2", "fptr", Expression::FunctionRef("binary".to_string())),
                    Stmt::mock_assign(
                        "a3",
                        "fptr",
                        Expression::FunctionRef("variadic".to_string()),
                    ),
                    Stmt::mock_call_indirect(
                        "call",
                        Expression::Var(Variable::new("fptr")),
                        vec![Expression::Const(1), Expression::Const(2)],
                        None,
                    ),
                ],
            ),
        ]);
        let (caller, call) = call_site(&program, "main", "call");
        let mut otf = OnTheFlyResolver::new(AliasSets::from_program(&program));
        // Two arguments fit `binary` exactly and `variadic` by surplus,
        // but not `unary`.
        assert_eq!(
            otf.resolve(&program, caller, call),
            BTreeSet::from([Tid::new("fn_binary"), Tid::new("fn_variadic")])
        );
    }
}
