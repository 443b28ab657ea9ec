use super::Variable;
use crate::prelude::*;

/// An expression is a side-effect-free computation over variables and constants.
///
/// Expressions deliberately stay small: the analyses in this crate only need
/// to distinguish constants, variable reads, arithmetic/comparison operations
/// and references to functions (for indirect calls).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum Expression {
    /// A variable read.
    Var(Variable),
    /// An integer constant.
    Const(i64),
    /// A binary operation.
    BinOp {
        /// The operation.
        op: BinOpType,
        /// The left operand.
        lhs: Box<Expression>,
        /// The right operand.
        rhs: Box<Expression>,
    },
    /// A unary operation.
    UnOp {
        /// The operation.
        op: UnOpType,
        /// The operand.
        arg: Box<Expression>,
    },
    /// A reference to the function with the given name,
    /// e.g. the right-hand side of taking a function pointer.
    FunctionRef(String),
    /// A value the IR cannot express, e.g. input from the environment.
    /// Analyses must treat it as completely unknown.
    Unknown {
        /// A description of the value source for logging purposes.
        description: String,
    },
}

/// The type/mnemonic of a binary operation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum BinOpType {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mult,
    /// Signed division.
    Div,
    /// Equality comparison, yields 0 or 1.
    Equal,
    /// Inequality comparison, yields 0 or 1.
    NotEqual,
    /// Signed less-than comparison, yields 0 or 1.
    Less,
}

impl BinOpType {
    /// Evaluate the operation on two constant operands.
    /// Returns `None` for division by zero.
    pub fn eval(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            BinOpType::Add => Some(lhs.wrapping_add(rhs)),
            BinOpType::Sub => Some(lhs.wrapping_sub(rhs)),
            BinOpType::Mult => Some(lhs.wrapping_mul(rhs)),
            BinOpType::Div => {
                if rhs == 0 {
                    None
                } else {
                    Some(lhs.wrapping_div(rhs))
                }
            }
            BinOpType::Equal => Some((lhs == rhs) as i64),
            BinOpType::NotEqual => Some((lhs != rhs) as i64),
            BinOpType::Less => Some((lhs < rhs) as i64),
        }
    }
}

/// The type/mnemonic of a unary operation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum UnOpType {
    /// Arithmetic negation.
    Neg,
    /// Boolean negation, maps 0 to 1 and everything else to 0.
    BoolNegate,
}

impl Expression {
    /// Return all variables that are read when evaluating the expression.
    pub fn input_vars(&self) -> Vec<&Variable> {
        let mut vars = Vec::new();
        self.collect_input_vars(&mut vars);
        vars
    }

    fn collect_input_vars<'a>(&'a self, vars: &mut Vec<&'a Variable>) {
        match self {
            Expression::Var(var) => vars.push(var),
            Expression::Const(_) | Expression::FunctionRef(_) | Expression::Unknown { .. } => (),
            Expression::BinOp { lhs, rhs, .. } => {
                lhs.collect_input_vars(vars);
                rhs.collect_input_vars(vars);
            }
            Expression::UnOp { arg, .. } => arg.collect_input_vars(vars),
        }
    }

    /// Return the names of all functions referenced in the expression.
    pub fn referenced_functions(&self) -> Vec<&str> {
        match self {
            Expression::FunctionRef(name) => vec![name],
            Expression::Var(_) | Expression::Const(_) | Expression::Unknown { .. } => Vec::new(),
            Expression::BinOp { lhs, rhs, .. } => {
                let mut names = lhs.referenced_functions();
                names.extend(rhs.referenced_functions());
                names
            }
            Expression::UnOp { arg, .. } => arg.referenced_functions(),
        }
    }

    /// If the expression is a plain constant, return its value.
    pub fn as_const(&self) -> Option<i64> {
        match self {
            Expression::Const(value) => Some(*value),
            _ => None,
        }
    }

    /// If the expression is a plain variable read, return the variable.
    pub fn as_var(&self) -> Option<&Variable> {
        match self {
            Expression::Var(var) => Some(var),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Expression::Var(var) => write!(formatter, "{var}"),
            Expression::Const(value) => write!(formatter, "{value}"),
            Expression::BinOp { op, lhs, rhs } => {
                let op_str = match op {
                    BinOpType::Add => "+",
                    BinOpType::Sub => "-",
                    BinOpType::Mult => "*",
                    BinOpType::Div => "/",
                    BinOpType::Equal => "==",
                    BinOpType::NotEqual => "!=",
                    BinOpType::Less => "<",
                };
                write!(formatter, "({lhs} {op_str} {rhs})")
            }
            Expression::UnOp { op, arg } => match op {
                UnOpType::Neg => write!(formatter, "-({arg})"),
                UnOpType::BoolNegate => write!(formatter, "!({arg})"),
            },
            Expression::FunctionRef(name) => write!(formatter, "&{name}"),
            Expression::Unknown { description } => write!(formatter, "unknown({description})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_var_collection() {
        let expr = Expression::BinOp {
            op: BinOpType::Add,
            lhs: Box::new(Expression::Var(Variable::new("x"))),
            rhs: Box::new(Expression::BinOp {
                op: BinOpType::Mult,
                lhs: Box::new(Expression::Const(2)),
                rhs: Box::new(Expression::Var(Variable::new("y"))),
            }),
        };
        let vars: Vec<_> = expr.input_vars().iter().map(|var| var.name.clone()).collect();
        assert_eq!(vars, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(format!("{expr}"), "(x + (2 * y))");
    }

    #[test]
    fn constant_evaluation() {
        assert_eq!(BinOpType::Add.eval(5, 3), Some(8));
        assert_eq!(BinOpType::Div.eval(7, 0), None);
        assert_eq!(BinOpType::Less.eval(1, 2), Some(1));
    }
}
