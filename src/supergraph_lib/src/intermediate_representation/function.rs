use super::{Expression, Stmt, Variable};
use crate::prelude::*;

/// A function (procedure) of the analyzed program.
///
/// A function without statements is an external declaration:
/// its body is unknown to the analysis and calls to it
/// are only modeled through call-to-return or summary flows.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Function {
    /// The name of the function.
    pub name: String,
    /// The formal parameters in declaration order.
    pub formal_params: Vec<Variable>,
    /// Whether the function accepts surplus arguments past the formal parameters.
    pub is_vararg: bool,
    /// The statements of the function body in layout order.
    /// Control flow is fallthrough unless a statement is a jump or return.
    pub statements: Vec<Term<Stmt>>,
}

impl Function {
    /// Return `true` if this function has no known body.
    pub fn is_external(&self) -> bool {
        self.statements.is_empty()
    }

    /// The first statement of the body, i.e. the single entry point
    /// of the function. `None` for external functions.
    pub fn entry_point(&self) -> Option<&Term<Stmt>> {
        self.statements.first()
    }

    /// All return statements of the body.
    pub fn exit_points(&self) -> Vec<&Term<Stmt>> {
        self.statements
            .iter()
            .filter(|stmt| stmt.term.is_return())
            .collect()
    }

    /// All call statements of the body.
    pub fn call_sites(&self) -> Vec<&Term<Stmt>> {
        self.statements
            .iter()
            .filter(|stmt| stmt.term.is_call())
            .collect()
    }

    /// Pair up actual arguments with the formal parameters they bind to.
    ///
    /// For a variadic function all surplus actuals are paired with the
    /// varargs pseudo-parameter. Surplus actuals of a non-variadic callee are
    /// dropped (the call is malformed, but the analysis keeps going).
    pub fn match_parameters<'a>(&self, args: &'a [Expression]) -> Vec<(&'a Expression, Variable)> {
        let mut pairs = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            match self.formal_params.get(index) {
                Some(formal) => pairs.push((arg, formal.clone())),
                None if self.is_vararg => pairs.push((arg, Variable::varargs())),
                None => (),
            }
        }
        pairs
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_and_exit_points() {
        let function = Function::mock_with_stmts(
            "foo",
            &["a"],
            vec![
                Stmt::mock_assign("s1", "x", Expression::Const(1)),
                Stmt::mock_return("s2", Some(Expression::Var(Variable::new("x")))),
            ],
        );
        assert_eq!(function.term.entry_point().unwrap().tid, Tid::new("s1"));
        assert_eq!(function.term.exit_points().len(), 1);
        assert!(!function.term.is_external());
        assert!(Function::mock("bar", &[]).term.is_external());
    }

    #[test]
    fn parameter_matching_with_varargs() {
        let callee = Function::mock_vararg("printf", &["fmt"], vec![Stmt::mock_return("r", None)]);
        let args = vec![
            Expression::Var(Variable::new("format")),
            Expression::Var(Variable::new("a")),
            Expression::Var(Variable::new("b")),
        ];
        let pairs = callee.term.match_parameters(&args);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].1.name, "fmt");
        assert!(pairs[1].1.is_varargs());
        assert!(pairs[2].1.is_varargs());
    }
}
