use crate::prelude::*;

/// The name of the pseudo-formal parameter that receives all surplus actual
/// arguments when calling a variadic function.
pub const VARARGS_PSEUDO_PARAM: &str = "...";

/// A named variable.
///
/// Variables are identified by their name only;
/// scoping is handled by the analyses themselves
/// (e.g. by pairing a variable with the function containing it).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Variable {
    /// The name of the variable.
    pub name: String,
}

impl Variable {
    /// Create a new variable with the given name.
    pub fn new(name: impl ToString) -> Variable {
        Variable {
            name: name.to_string(),
        }
    }

    /// The pseudo-variable that stands in for the surplus arguments of a
    /// variadic call. Data-flow facts attached to it are kept conservatively
    /// wide, since the callee body does not reference it directly.
    pub fn varargs() -> Variable {
        Variable {
            name: VARARGS_PSEUDO_PARAM.to_string(),
        }
    }

    /// Return `true` if this is the varargs pseudo-variable.
    pub fn is_varargs(&self) -> bool {
        self.name == VARARGS_PSEUDO_PARAM
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.name)
    }
}
