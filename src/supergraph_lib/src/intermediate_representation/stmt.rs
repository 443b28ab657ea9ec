use super::{Expression, Variable};
use crate::prelude::*;

/// A statement is a single instruction inside a function body.
///
/// Statements form the nodes of the interprocedural control flow graph.
/// Control flow inside a function is fallthrough to the next statement in the
/// body unless the statement is a (conditional) jump or a return.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum Stmt {
    /// Assign the value of the expression to the variable.
    Assign {
        /// The assigned variable.
        var: Variable,
        /// The right-hand side expression.
        value: Expression,
    },
    /// Allocate a new object of the given class and assign it to the variable.
    /// The statement's `Tid` serves as the allocation site identifier.
    New {
        /// The variable receiving the new object.
        var: Variable,
        /// The name of the instantiated class.
        class: String,
    },
    /// Call a function.
    Call {
        /// The call target.
        target: CallTarget,
        /// The actual arguments.
        args: Vec<Expression>,
        /// The variable receiving the return value, if any.
        return_var: Option<Variable>,
    },
    /// Unconditionally continue execution at the statement with the given `Tid`.
    Jump {
        /// The jump target.
        target: Tid,
    },
    /// Continue at the target statement if the condition evaluates to nonzero,
    /// else fall through to the next statement in the body.
    CondJump {
        /// The branch condition.
        condition: Expression,
        /// The jump target for a nonzero condition.
        if_true: Tid,
    },
    /// Return from the function with an optional return value.
    Return {
        /// The returned value.
        value: Option<Expression>,
    },
    /// A statement without effect. Useful as an explicit join point.
    Nop,
}

/// The target of a call statement.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum CallTarget {
    /// A direct call to the function with the given name.
    Direct(String),
    /// An indirect call through a function pointer value.
    Indirect(Expression),
    /// A virtual method call, dispatched through the vtable slot of the
    /// receiver object. `class` is the static type of the receiver.
    Virtual {
        /// The receiver object.
        receiver: Variable,
        /// The static class of the receiver.
        class: String,
        /// The vtable slot of the called method.
        slot: usize,
    },
}

impl Stmt {
    /// Return `true` if this is a call statement.
    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::Call { .. })
    }

    /// Return `true` if this statement exits the function.
    pub fn is_return(&self) -> bool {
        matches!(self, Stmt::Return { .. })
    }

    /// The variable written by this statement, if any.
    pub fn defined_variable(&self) -> Option<&Variable> {
        match self {
            Stmt::Assign { var, .. } | Stmt::New { var, .. } => Some(var),
            Stmt::Call { return_var, .. } => return_var.as_ref(),
            Stmt::Jump { .. } | Stmt::CondJump { .. } | Stmt::Return { .. } | Stmt::Nop => None,
        }
    }

    /// All variables read by this statement.
    pub fn used_variables(&self) -> Vec<&Variable> {
        match self {
            Stmt::Assign { value, .. } => value.input_vars(),
            Stmt::New { .. } | Stmt::Jump { .. } | Stmt::Nop => Vec::new(),
            Stmt::Call { target, args, .. } => {
                let mut vars = match target {
                    CallTarget::Direct(_) => Vec::new(),
                    CallTarget::Indirect(expr) => expr.input_vars(),
                    CallTarget::Virtual { receiver, .. } => vec![receiver],
                };
                for arg in args {
                    vars.extend(arg.input_vars());
                }
                vars
            }
            Stmt::CondJump { condition, .. } => condition.input_vars(),
            Stmt::Return { value } => value.as_ref().map(|expr| expr.input_vars()).unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Stmt::Assign { var, value } => write!(formatter, "{var} = {value}"),
            Stmt::New { var, class } => write!(formatter, "{var} = new {class}"),
            Stmt::Call {
                target,
                args,
                return_var,
            } => {
                if let Some(var) = return_var {
                    write!(formatter, "{var} = ")?;
                }
                match target {
                    CallTarget::Direct(name) => write!(formatter, "{name}")?,
                    CallTarget::Indirect(expr) => write!(formatter, "(*{expr})")?,
                    CallTarget::Virtual {
                        receiver, slot, ..
                    } => write!(formatter, "{receiver}.vtable[{slot}]")?,
                }
                let args = args.iter().map(|arg| format!("{arg}")).collect::<Vec<_>>();
                write!(formatter, "({})", args.join(", "))
            }
            Stmt::Jump { target } => write!(formatter, "goto {target}"),
            Stmt::CondJump { condition, if_true } => {
                write!(formatter, "if {condition} goto {if_true}")
            }
            Stmt::Return { value: Some(value) } => write!(formatter, "return {value}"),
            Stmt::Return { value: None } => write!(formatter, "return"),
            Stmt::Nop => write!(formatter, "nop"),
        }
    }
}
