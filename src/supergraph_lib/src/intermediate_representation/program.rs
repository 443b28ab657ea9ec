use super::{Function, Stmt, Variable};
use crate::prelude::*;
use std::collections::BTreeSet;

/// A class definition for modeling virtual dispatch.
///
/// The vtable lists method implementations by slot. A missing slot is
/// inherited from the parent class, mirroring how a derived class without an
/// override reuses the base implementation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct ClassDef {
    /// The name of the class.
    pub name: String,
    /// The name of the parent class, if any.
    pub parent: Option<String>,
    /// The function names implementing each vtable slot.
    pub vtable: Vec<String>,
}

/// The program database: all functions, global variables and class definitions
/// of the program under analysis.
///
/// The program is immutable for the lifetime of an analysis;
/// statements and functions are only ever borrowed out of it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Program {
    /// All functions, defined and external.
    pub functions: Vec<Term<Function>>,
    /// The global variables of the program.
    pub global_variables: Vec<Variable>,
    /// The class hierarchy for virtual dispatch.
    pub classes: Vec<ClassDef>,
}

impl Program {
    /// Look up a function (defined or external) by name.
    pub fn get_function(&self, name: &str) -> Option<&Term<Function>> {
        self.functions
            .iter()
            .find(|function| function.term.name == name)
    }

    /// Look up a function definition by name.
    /// Returns `None` if the function is unknown or has no body.
    pub fn get_function_definition(&self, name: &str) -> Option<&Term<Function>> {
        self.get_function(name)
            .filter(|function| !function.term.is_external())
    }

    /// Look up a function by its term identifier.
    pub fn get_function_by_tid(&self, tid: &Tid) -> Option<&Term<Function>> {
        self.functions.iter().find(|function| function.tid == *tid)
    }

    /// Iterate over all statements of all function bodies
    /// together with the function containing them.
    pub fn all_statements(&self) -> impl Iterator<Item = (&Term<Function>, &Term<Stmt>)> {
        self.functions
            .iter()
            .flat_map(|function| function.term.statements.iter().map(move |stmt| (function, stmt)))
    }

    /// All classes that are instantiated somewhere in the program,
    /// i.e. the receiver types that can actually occur at runtime.
    pub fn instantiated_classes(&self) -> BTreeSet<&str> {
        self.all_statements()
            .filter_map(|(_, stmt)| match &stmt.term {
                Stmt::New { class, .. } => Some(class.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Look up a class definition by name.
    pub fn get_class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// The given class and all its transitive subclasses.
    pub fn class_and_subclasses(&self, name: &str) -> Vec<&ClassDef> {
        let mut result = Vec::new();
        let mut worklist = vec![name];
        while let Some(current) = worklist.pop() {
            if let Some(class) = self.get_class(current) {
                if result.iter().any(|collected: &&ClassDef| collected.name == class.name) {
                    continue;
                }
                result.push(class);
            }
            for class in &self.classes {
                if class.parent.as_deref() == Some(current) {
                    worklist.push(&class.name);
                }
            }
        }
        result
    }

    /// The class instantiated by the allocation statement with the given
    /// term identifier.
    pub fn allocation_class(&self, site: &Tid) -> Option<&str> {
        self.all_statements().find_map(|(_, stmt)| match &stmt.term {
            Stmt::New { class, .. } if stmt.tid == *site => Some(class.as_str()),
            _ => None,
        })
    }

    /// Resolve the method implementing the given vtable slot for the given class.
    /// Missing slots are inherited from the parent class chain.
    pub fn vtable_entry(&self, class_name: &str, slot: usize) -> Option<&str> {
        let mut current = self.get_class(class_name);
        while let Some(class) = current {
            if let Some(method) = class.vtable.get(slot) {
                return Some(method);
            }
            current = class.parent.as_deref().and_then(|parent| self.get_class(parent));
        }
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate_representation::Expression;

    fn hierarchy_program() -> Program {
        Program::mock_with_classes(
            vec![
                Function::mock("Base::run", &["this"]),
                Function::mock("Derived::run", &["this"]),
            ],
            vec![
                ClassDef::mock("Base", None, &["Base::run"]),
                ClassDef::mock("Derived", Some("Base"), &["Derived::run"]),
                ClassDef::mock("Leaf", Some("Derived"), &[]),
            ],
        )
    }

    #[test]
    fn class_hierarchy_queries() {
        let program = hierarchy_program();
        let subclasses: Vec<_> = program
            .class_and_subclasses("Base")
            .iter()
            .map(|class| class.name.clone())
            .collect();
        assert!(subclasses.contains(&"Base".to_string()));
        assert!(subclasses.contains(&"Derived".to_string()));
        assert!(subclasses.contains(&"Leaf".to_string()));
        // Leaf has no own vtable entry and inherits from Derived.
        assert_eq!(program.vtable_entry("Leaf", 0), Some("Derived::run"));
        assert_eq!(program.vtable_entry("Base", 1), None);
    }

    #[test]
    fn function_lookup_distinguishes_definitions() {
        let program = Program::mock(vec![
            Function::mock("malloc", &["size"]),
            Function::mock_with_stmts(
                "main",
                &[],
                vec![Stmt::mock_return("r", Some(Expression::Const(0)))],
            ),
        ]);
        assert!(program.get_function("malloc").is_some());
        assert!(program.get_function_definition("malloc").is_none());
        assert!(program.get_function_definition("main").is_some());
        assert!(program.get_function_definition("missing").is_none());
        assert_eq!(program.instantiated_classes().len(), 0);
    }
}
