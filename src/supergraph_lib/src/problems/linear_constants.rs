//! Interprocedural linear constant propagation.
//!
//! The analysis computes for every program point which variables hold a
//! known constant value. Facts are tracked variables, values live in the
//! three-point lattice *unknown (top) / constant / not-a-constant (bottom)*
//! and edge functions describe how a value is derived from another one:
//! either stored directly (`x = 5`) or through a linear transformation
//! (`y = 2 * x + 3`). The edge-function family is closed under composition,
//! so arbitrarily long derivation chains collapse into a single function.
//!
//! Constants propagate through calls (constant and variable arguments),
//! through returned values and across branches; disagreeing branches
//! join to the bottom element. Non-linear right-hand sides
//! and values from the environment are tracked as "assigned, but not
//! a constant", which distinguishes them from never-assigned variables.
//!
//! The intermediate representation has no pointers or global state,
//! so a call can only affect its return-value variable in the caller.

use crate::analysis::graph::Cfg;
use crate::analysis::ifds_ide::{
    EdgeFunction, EdgeFunctionOps, FlowFunction, IdeProblem, InitialSeeds, JoinLattice,
};
use crate::intermediate_representation::*;
use crate::prelude::*;
use std::collections::BTreeSet;

/// A dataflow fact of the constant propagation:
/// either the distinguished zero fact or a tracked variable.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LcaFact {
    /// The tautological fact, reachable wherever execution can reach.
    Zero,
    /// The value of the given variable is tracked.
    Var(Variable),
}

impl LcaFact {
    /// The fact tracking the given variable.
    pub fn var(name: &str) -> LcaFact {
        LcaFact::Var(Variable::new(name))
    }
}

impl std::fmt::Display for LcaFact {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LcaFact::Zero => write!(formatter, "Λ"),
            LcaFact::Var(var) => write!(formatter, "{var}"),
        }
    }
}

/// The value lattice of the constant propagation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LcaValue {
    /// No assignment has been seen.
    Top,
    /// The variable holds exactly this constant.
    Const(i64),
    /// The variable was assigned, but not a single known constant.
    Bottom,
}

impl JoinLattice for LcaValue {
    fn top() -> LcaValue {
        LcaValue::Top
    }

    fn bottom() -> LcaValue {
        LcaValue::Bottom
    }

    fn join(&self, other: &LcaValue) -> LcaValue {
        match (self, other) {
            (value, other) if value == other => value.clone(),
            (LcaValue::Top, other) => other.clone(),
            (value, LcaValue::Top) => value.clone(),
            _ => LcaValue::Bottom,
        }
    }
}

/// The edge functions of the constant propagation.
/// All arithmetic wraps, matching the evaluation semantics
/// of [`BinOpType`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LcaEdgeFunction {
    /// The constant function to the given value, e.g. for `x = 5`.
    Store(i64),
    /// A linear transformation `v -> scale * v + offset`,
    /// e.g. for `y = 2 * x + 3`.
    Affine {
        /// The multiplicative part.
        scale: i64,
        /// The additive part.
        offset: i64,
    },
}

impl EdgeFunctionOps for LcaEdgeFunction {
    type Value = LcaValue;

    fn compute_target(&self, source: &LcaValue) -> LcaValue {
        match self {
            LcaEdgeFunction::Store(value) => LcaValue::Const(*value),
            LcaEdgeFunction::Affine { scale, offset } => match source {
                LcaValue::Const(value) => {
                    LcaValue::Const(scale.wrapping_mul(*value).wrapping_add(*offset))
                }
                other => other.clone(),
            },
        }
    }

    fn compose_with(&self, second: &LcaEdgeFunction) -> Option<EdgeFunction<LcaEdgeFunction>> {
        let composed = match (self, second) {
            // A later store overwrites whatever was derived before.
            (_, LcaEdgeFunction::Store(value)) => LcaEdgeFunction::Store(*value),
            (LcaEdgeFunction::Store(value), LcaEdgeFunction::Affine { scale, offset }) => {
                LcaEdgeFunction::Store(scale.wrapping_mul(*value).wrapping_add(*offset))
            }
            (
                LcaEdgeFunction::Affine { scale: scale1, offset: offset1 },
                LcaEdgeFunction::Affine { scale: scale2, offset: offset2 },
            ) => LcaEdgeFunction::Affine {
                scale: scale1.wrapping_mul(*scale2),
                offset: scale2.wrapping_mul(*offset1).wrapping_add(*offset2),
            },
        };
        Some(EdgeFunction::Problem(composed))
    }
}

/// The right-hand side of an assignment,
/// viewed through the constant lattice.
enum Rhs {
    /// A known constant.
    Const(i64),
    /// A plain copy of another variable.
    Copy(Variable),
    /// A linear transformation of another variable.
    Affine {
        var: Variable,
        scale: i64,
        offset: i64,
    },
    /// Anything the lattice cannot express.
    Opaque,
}

fn classify_rhs(expr: &Expression) -> Rhs {
    if let Some(value) = expr.as_const() {
        return Rhs::Const(value);
    }
    if let Some(var) = expr.as_var() {
        return Rhs::Copy(var.clone());
    }
    match expr {
        Expression::UnOp {
            op: UnOpType::Neg,
            arg,
        } => match (arg.as_const(), arg.as_var()) {
            (Some(value), _) => Rhs::Const(value.wrapping_neg()),
            (_, Some(var)) => Rhs::Affine {
                var: var.clone(),
                scale: -1,
                offset: 0,
            },
            _ => Rhs::Opaque,
        },
        Expression::BinOp { op, lhs, rhs } => {
            match (lhs.as_var(), lhs.as_const(), rhs.as_var(), rhs.as_const(), op) {
                (_, Some(lhs), _, Some(rhs), op) => match op.eval(lhs, rhs) {
                    Some(value) => Rhs::Const(value),
                    None => Rhs::Opaque,
                },
                (Some(var), _, _, Some(offset), BinOpType::Add) => Rhs::Affine {
                    var: var.clone(),
                    scale: 1,
                    offset,
                },
                (Some(var), _, _, Some(offset), BinOpType::Sub) => Rhs::Affine {
                    var: var.clone(),
                    scale: 1,
                    offset: offset.wrapping_neg(),
                },
                (Some(var), _, _, Some(scale), BinOpType::Mult) => Rhs::Affine {
                    var: var.clone(),
                    scale,
                    offset: 0,
                },
                (_, Some(offset), Some(var), _, BinOpType::Add) => Rhs::Affine {
                    var: var.clone(),
                    scale: 1,
                    offset,
                },
                (_, Some(offset), Some(var), _, BinOpType::Sub) => Rhs::Affine {
                    var: var.clone(),
                    scale: -1,
                    offset,
                },
                (_, Some(scale), Some(var), _, BinOpType::Mult) => Rhs::Affine {
                    var: var.clone(),
                    scale,
                    offset: 0,
                },
                _ => Rhs::Opaque,
            }
        }
        _ => Rhs::Opaque,
    }
}

/// The linear constant propagation problem.
/// Plug it into an [`crate::analysis::ifds_ide::IdeSolver`].
pub struct LinearConstantAnalysis {
    entry_points: Vec<String>,
}

impl LinearConstantAnalysis {
    /// Create the analysis, seeded at the entry points
    /// with the given function names.
    pub fn new(entry_points: Vec<String>) -> LinearConstantAnalysis {
        LinearConstantAnalysis { entry_points }
    }
}

/// The flow function of an assignment `var = <rhs>`.
fn assignment_flow(var: Variable, rhs: &Rhs) -> FlowFunction<LcaFact> {
    match rhs {
        // The new value is derived from the zero fact.
        Rhs::Const(_) | Rhs::Opaque => FlowFunction::from_lambda(move |fact| match fact {
            LcaFact::Zero => BTreeSet::from([LcaFact::Zero, LcaFact::Var(var.clone())]),
            LcaFact::Var(other) if *other == var => BTreeSet::new(),
            other => BTreeSet::from([other.clone()]),
        }),
        Rhs::Copy(source) | Rhs::Affine { var: source, .. } => {
            if *source == var {
                // Self-referencing updates like `x = x + 1` keep the fact
                // alive, the edge function transforms the value.
                FlowFunction::Identity
            } else {
                let source = source.clone();
                FlowFunction::from_lambda(move |fact| match fact {
                    LcaFact::Var(other) if *other == var => BTreeSet::new(),
                    LcaFact::Var(other) if *other == source => BTreeSet::from([
                        LcaFact::Var(source.clone()),
                        LcaFact::Var(var.clone()),
                    ]),
                    other => BTreeSet::from([other.clone()]),
                })
            }
        }
    }
}

impl IdeProblem for LinearConstantAnalysis {
    type Fact = LcaFact;
    type Value = LcaValue;
    type EdgeFn = LcaEdgeFunction;

    fn get_normal_flow_function(
        &self,
        curr: &Term<Stmt>,
        _succ: &Term<Stmt>,
    ) -> FlowFunction<LcaFact> {
        match &curr.term {
            Stmt::Assign { var, value } => assignment_flow(var.clone(), &classify_rhs(value)),
            // A fresh object is not an integer constant.
            Stmt::New { var, .. } => assignment_flow(var.clone(), &Rhs::Opaque),
            _ => FlowFunction::Identity,
        }
    }

    fn get_call_flow_function(
        &self,
        call: &Term<Stmt>,
        callee: &Term<Function>,
    ) -> FlowFunction<LcaFact> {
        let Stmt::Call { args, .. } = &call.term else {
            panic!("Call flow requested for a statement that is not a call.");
        };
        let mut copied: Vec<(Variable, Variable)> = Vec::new();
        let mut generated: Vec<Variable> = Vec::new();
        for (actual, formal) in callee.term.match_parameters(args) {
            match actual.as_var() {
                Some(var) => copied.push((var.clone(), formal)),
                // Constant and opaque arguments derive the formal
                // from the zero fact, the call edge function carries
                // the actual value.
                None => generated.push(formal),
            }
        }
        FlowFunction::from_lambda(move |fact| match fact {
            LcaFact::Zero => {
                let mut facts = BTreeSet::from([LcaFact::Zero]);
                facts.extend(generated.iter().cloned().map(LcaFact::Var));
                facts
            }
            LcaFact::Var(var) => copied
                .iter()
                .filter(|(actual, _)| actual == var)
                .map(|(_, formal)| LcaFact::Var(formal.clone()))
                .collect(),
        })
    }

    fn get_return_flow_function(
        &self,
        call: &Term<Stmt>,
        _callee: &Term<Function>,
        exit: &Term<Stmt>,
        _return_site: &Term<Stmt>,
    ) -> FlowFunction<LcaFact> {
        let Stmt::Call { return_var, .. } = &call.term else {
            panic!("Return flow requested for a statement that is not a call.");
        };
        let Some(return_var) = return_var.clone() else {
            // Without a receiving variable only reachability flows back.
            return FlowFunction::from_lambda(|fact| match fact {
                LcaFact::Zero => BTreeSet::from([LcaFact::Zero]),
                LcaFact::Var(_) => BTreeSet::new(),
            });
        };
        let returned = match &exit.term {
            Stmt::Return { value: Some(value) } => classify_rhs(value),
            _ => Rhs::Opaque,
        };
        match returned {
            Rhs::Copy(source) => FlowFunction::from_lambda(move |fact| match fact {
                LcaFact::Zero => BTreeSet::from([LcaFact::Zero]),
                LcaFact::Var(var) if *var == source => {
                    BTreeSet::from([LcaFact::Var(return_var.clone())])
                }
                LcaFact::Var(_) => BTreeSet::new(),
            }),
            // Constant or opaque return values derive the receiving
            // variable from the zero fact.
            _ => FlowFunction::from_lambda(move |fact| match fact {
                LcaFact::Zero => {
                    BTreeSet::from([LcaFact::Zero, LcaFact::Var(return_var.clone())])
                }
                LcaFact::Var(_) => BTreeSet::new(),
            }),
        }
    }

    fn get_call_to_return_flow_function(
        &self,
        call: &Term<Stmt>,
        _return_site: &Term<Stmt>,
    ) -> FlowFunction<LcaFact> {
        match &call.term {
            // The callee overwrites the receiving variable.
            Stmt::Call {
                return_var: Some(var),
                ..
            } => FlowFunction::Kill(LcaFact::Var(var.clone())),
            _ => FlowFunction::Identity,
        }
    }

    fn get_normal_edge_function(
        &self,
        curr: &Term<Stmt>,
        curr_fact: &LcaFact,
        _succ: &Term<Stmt>,
        succ_fact: &LcaFact,
    ) -> EdgeFunction<LcaEdgeFunction> {
        let (var, rhs) = match &curr.term {
            Stmt::Assign { var, value } => (var, classify_rhs(value)),
            Stmt::New { var, .. } => (var, Rhs::Opaque),
            _ => return EdgeFunction::Identity,
        };
        if !matches!(succ_fact, LcaFact::Var(succ_var) if succ_var == var) {
            return EdgeFunction::Identity;
        }
        match rhs {
            Rhs::Const(value) if *curr_fact == LcaFact::Zero => {
                EdgeFunction::Problem(LcaEdgeFunction::Store(value))
            }
            Rhs::Opaque if *curr_fact == LcaFact::Zero => EdgeFunction::AllBottom,
            Rhs::Affine { var: source, scale, offset }
                if matches!(curr_fact, LcaFact::Var(curr_var) if *curr_var == source) =>
            {
                EdgeFunction::Problem(LcaEdgeFunction::Affine { scale, offset })
            }
            _ => EdgeFunction::Identity,
        }
    }

    fn get_call_edge_function(
        &self,
        call: &Term<Stmt>,
        call_fact: &LcaFact,
        callee: &Term<Function>,
        entry_fact: &LcaFact,
    ) -> EdgeFunction<LcaEdgeFunction> {
        let (LcaFact::Zero, LcaFact::Var(formal)) = (call_fact, entry_fact) else {
            return EdgeFunction::Identity;
        };
        let Stmt::Call { args, .. } = &call.term else {
            return EdgeFunction::Identity;
        };
        for (actual, bound) in callee.term.match_parameters(args) {
            if bound != *formal {
                continue;
            }
            return match classify_rhs(actual) {
                Rhs::Const(value) => EdgeFunction::Problem(LcaEdgeFunction::Store(value)),
                Rhs::Copy(_) => EdgeFunction::Identity,
                _ => EdgeFunction::AllBottom,
            };
        }
        EdgeFunction::Identity
    }

    fn get_return_edge_function(
        &self,
        _call: &Term<Stmt>,
        _callee: &Term<Function>,
        exit: &Term<Stmt>,
        exit_fact: &LcaFact,
        _return_site: &Term<Stmt>,
        return_fact: &LcaFact,
    ) -> EdgeFunction<LcaEdgeFunction> {
        if *exit_fact != LcaFact::Zero || !matches!(return_fact, LcaFact::Var(_)) {
            return EdgeFunction::Identity;
        }
        let returned = match &exit.term {
            Stmt::Return { value: Some(value) } => classify_rhs(value),
            _ => Rhs::Opaque,
        };
        match returned {
            Rhs::Const(value) => EdgeFunction::Problem(LcaEdgeFunction::Store(value)),
            Rhs::Copy(_) | Rhs::Affine { .. } => EdgeFunction::Identity,
            Rhs::Opaque => EdgeFunction::AllBottom,
        }
    }

    fn initial_seeds(&self, cfg: &Cfg) -> InitialSeeds<LcaFact> {
        let names: Vec<&str> = self.entry_points.iter().map(String::as_str).collect();
        InitialSeeds::at_function_entries(cfg, &names, LcaFact::Zero)
    }

    fn create_zero_value(&self) -> LcaFact {
        LcaFact::Zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::callgraph::resolver::ClassHierarchyResolver;
    use crate::analysis::callgraph::CallGraph;
    use crate::analysis::ifds_ide::{IdeSolver, SolveStatus, SolverConfig};

    fn solve(program: &Program) -> Vec<(String, LcaFact, LcaValue)> {
        let call_graph = CallGraph::build(program, &mut ClassHierarchyResolver);
        let cfg = Cfg::build(program, &call_graph);
        let analysis = LinearConstantAnalysis::new(vec!["main".to_string()]);
        let mut solver = IdeSolver::new(analysis, &cfg, SolverConfig::default());
        assert_eq!(solver.solve(), SolveStatus::Converged);
        solver
            .results()
            .unwrap()
            .iter()
            .map(|(node, fact, value)| {
                (cfg.stmt(node).tid.to_string(), fact.clone(), value.clone())
            })
            .collect()
    }

    fn value_at(
        values: &[(String, LcaFact, LcaValue)],
        tid: &str,
        fact: LcaFact,
    ) -> Option<LcaValue> {
        values
            .iter()
            .find(|(at, found, _)| at == tid && *found == fact)
            .map(|(_, _, value)| value.clone())
    }

    fn add(lhs: &str, offset: i64) -> Expression {
        Expression::BinOp {
            op: BinOpType::Add,
            lhs: Box::new(Expression::Var(Variable::new(lhs))),
            rhs: Box::new(Expression::Const(offset)),
        }
    }

    fn times(lhs: &str, scale: i64) -> Expression {
        Expression::BinOp {
            op: BinOpType::Mult,
            lhs: Box::new(Expression::Var(Variable::new(lhs))),
            rhs: Box::new(Expression::Const(scale)),
        }
    }

    #[test]
    fn straight_line_constants_are_tracked() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_assign("set_x", "x", Expression::Const(5)),
                Stmt::mock_assign("set_y", "y", add("x", 3)),
                Stmt::mock_return("ret", Some(Expression::Var(Variable::new("y")))),
            ],
        )]);
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("x")),
            Some(LcaValue::Const(5))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("y")),
            Some(LcaValue::Const(8))
        );
        // Reachability of the return statement itself.
        assert_eq!(
            value_at(&values, "ret", LcaFact::Zero),
            Some(LcaValue::Bottom)
        );
    }

    #[test]
    fn affine_forms_with_the_constant_on_either_side_are_tracked() {
        let const_op_var = |op, value, var: &str| Expression::BinOp {
            op,
            lhs: Box::new(Expression::Const(value)),
            rhs: Box::new(Expression::Var(Variable::new(var))),
        };
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_assign("set_x", "x", Expression::Const(4)),
                Stmt::mock_assign("set_y", "y", const_op_var(BinOpType::Add, 10, "x")),
                Stmt::mock_assign("set_z", "z", const_op_var(BinOpType::Sub, 10, "x")),
                Stmt::mock_assign("set_v", "v", const_op_var(BinOpType::Mult, 3, "x")),
                Stmt::mock_assign("set_w", "w", times("x", 5)),
                Stmt::mock_return("ret", None),
            ],
        )]);
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("y")),
            Some(LcaValue::Const(14))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("z")),
            Some(LcaValue::Const(6))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("v")),
            Some(LcaValue::Const(12))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("w")),
            Some(LcaValue::Const(20))
        );
    }

    fn double_program(argument: Expression) -> Program {
        Program::mock(vec![
            Function::mock_with_stmts(
                "double",
                &["n"],
                vec![
                    Stmt::mock_assign("double_body", "m", times("n", 2)),
                    Stmt::mock_return("double_ret", Some(Expression::Var(Variable::new("m")))),
                ],
            ),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![
                    Stmt::mock_assign("set_x", "x", Expression::Const(21)),
                    Stmt::mock_call("call", "double", vec![argument], Some("y")),
                    Stmt::mock_return("ret", None),
                ],
            ),
        ])
    }

    #[test]
    fn constants_flow_through_calls_and_returns() {
        let program = double_program(Expression::Var(Variable::new("x")));
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "double_ret", LcaFact::var("n")),
            Some(LcaValue::Const(21))
        );
        assert_eq!(
            value_at(&values, "double_ret", LcaFact::var("m")),
            Some(LcaValue::Const(42))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("y")),
            Some(LcaValue::Const(42))
        );
        // The argument variable survives the call unchanged.
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("x")),
            Some(LcaValue::Const(21))
        );
    }

    #[test]
    fn constant_arguments_seed_the_callee() {
        let program = double_program(Expression::Const(7));
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "double_ret", LcaFact::var("n")),
            Some(LcaValue::Const(7))
        );
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("y")),
            Some(LcaValue::Const(14))
        );
    }

    #[test]
    fn joining_branches_loses_disagreeing_constants() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_cond_jump("branch", Expression::Var(Variable::new("c")), "else_arm"),
                Stmt::mock_assign("then_arm", "x", Expression::Const(1)),
                Stmt::mock_jump("skip", "join"),
                Stmt::mock_assign("else_arm", "x", Expression::Const(2)),
                Stmt::mock_nop("join"),
                Stmt::mock_return("ret", None),
            ],
        )]);
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("x")),
            Some(LcaValue::Bottom)
        );
        // The branch variable was never assigned.
        assert_eq!(value_at(&values, "ret", LcaFact::var("c")), None);
    }

    #[test]
    fn unresolved_calls_keep_caller_facts() {
        let program = Program::mock(vec![Function::mock_with_stmts(
            "main",
            &[],
            vec![
                Stmt::mock_assign("set_x", "x", Expression::Const(3)),
                Stmt::mock_call_indirect(
                    "call",
                    Expression::Var(Variable::new("fptr")),
                    vec![Expression::Var(Variable::new("x"))],
                    Some("y"),
                ),
                Stmt::mock_return("ret", None),
            ],
        )]);
        let values = solve(&program);
        assert_eq!(
            value_at(&values, "ret", LcaFact::var("x")),
            Some(LcaValue::Const(3))
        );
        // Nothing is known about the call, so nothing flows into `y`.
        assert_eq!(value_at(&values, "ret", LcaFact::var("y")), None);
    }
}
