//! Static rules applied to a parsed script using `Validation`.

use crate::script::ast::{walk_expr, walk_stmt, Expr, Program, Stmt, Visitor};
use crate::safety::violations::SafetyViolation;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Outcome of one rule check.
pub type SafetyCheck = Validation<(), NonEmptyVec<SafetyViolation>>;

/// Pure utility functions every script may call.
pub const ALLOWED_CALLS: &[&str] = &[
    "print", "len", "abs", "min", "max", "int", "float", "str", "bool", "round", "list", "dict",
    "set", "tuple", "range", "sorted", "sum", "all", "any", "isinstance", "hasattr",
];

/// Reflective or I/O-capable operations that are never callable.
pub const DENIED_CALLS: &[&str] = &[
    "eval", "exec", "compile", "open", "input", "getattr", "setattr", "delattr", "globals",
    "locals", "vars", "__import__", "memoryview", "bytearray", "bytes",
];

/// Protocol attribute names ordinary expressions are allowed to touch.
pub const ALLOWED_DUNDERS: &[&str] = &[
    "__len__", "__getitem__", "__setitem__", "__delitem__", "__contains__", "__add__", "__sub__",
    "__mul__", "__truediv__", "__floordiv__", "__mod__", "__pow__", "__eq__", "__ne__", "__lt__",
    "__le__", "__gt__", "__ge__", "__iter__", "__next__", "__call__", "__str__", "__repr__",
    "__bool__", "__hash__", "__abs__",
];

/// Introspection and interpreter-machinery attributes.
pub const RESTRICTED_ATTRIBUTES: &[&str] = &[
    "__globals__", "__builtins__", "__code__", "__closure__", "__self__", "__class__",
    "__bases__", "__subclasses__", "__mro__", "__init__", "__new__", "__del__", "__dict__",
    "__getattribute__", "__setattr__", "__delattr__", "__get__", "__set__", "__delete__",
    "__init_subclass__", "__prepare__", "f_locals", "f_globals", "f_builtins", "f_code",
    "f_back", "f_trace", "gi_frame", "gi_code", "gi_running", "gi_yieldfrom", "co_code",
    "co_consts", "co_names", "co_varnames", "co_freevars", "co_cellvars", "func_code",
    "func_globals", "func_builtins", "func_closure", "func_defaults", "__file__", "__cached__",
    "__loader__", "__package__", "__spec__", "_as_parameter_", "_fields_", "_length_", "_type_",
    "__annotations__", "__qualname__", "__module__", "__slots__", "__weakref__", "__set_name__",
    "format_map", "mro", "with_traceback",
];

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Check one attribute name against the restricted and special lists.
pub fn check_attribute(attr: &str) -> SafetyCheck {
    if ALLOWED_DUNDERS.contains(&attr) {
        Validation::success(())
    } else if RESTRICTED_ATTRIBUTES.contains(&attr) {
        Validation::fail(SafetyViolation::RestrictedAttribute {
            attr: attr.to_string(),
        })
    } else if is_dunder(attr) {
        Validation::fail(SafetyViolation::SpecialAttribute {
            attr: attr.to_string(),
        })
    } else {
        Validation::success(())
    }
}

/// Check a call by bare name. Unknown names are tolerated unless denied.
pub fn check_call(name: &str, known_variables: &HashSet<String>) -> SafetyCheck {
    if DENIED_CALLS.contains(&name) {
        return Validation::fail(SafetyViolation::ForbiddenCall {
            name: name.to_string(),
        });
    }
    if !ALLOWED_CALLS.contains(&name) && !known_variables.contains(name) {
        tracing::debug!(
            target: "bsm_engine",
            function = name,
            "tolerating call to function outside the allow-list"
        );
    }
    Validation::success(())
}

/// Visits every node and records one check per construct of interest.
pub(crate) struct RuleVisitor<'a> {
    known_variables: &'a HashSet<String>,
    checks: Vec<SafetyCheck>,
}

impl<'a> RuleVisitor<'a> {
    pub(crate) fn new(known_variables: &'a HashSet<String>) -> Self {
        Self {
            known_variables,
            checks: Vec::new(),
        }
    }

    /// Run all rules over `program`, accumulating every violation.
    pub(crate) fn check(mut self, program: &Program) -> SafetyCheck {
        crate::script::ast::walk_program(&mut self, program);
        Validation::all_vec(self.checks).map(|_| ())
    }
}

impl Visitor for RuleVisitor<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import { .. } => self.checks.push(Validation::fail(SafetyViolation::Import)),
            Stmt::ImportFrom { .. } => {
                self.checks.push(Validation::fail(SafetyViolation::ImportFrom))
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call { func, args } => {
                if let Expr::Name(name) = func.as_ref() {
                    self.checks.push(check_call(name, self.known_variables));
                    args.iter().for_each(|arg| self.visit_expr(arg));
                    return;
                }
            }
            Expr::Attribute { attr, .. } => self.checks.push(check_attribute(attr)),
            // Bare references to denied callables (`f = eval`) are rejected too.
            Expr::Name(name) if DENIED_CALLS.contains(&name.as_str()) => {
                self.checks
                    .push(Validation::fail(SafetyViolation::ForbiddenCall {
                        name: name.clone(),
                    }));
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn run(source: &str) -> SafetyCheck {
        let known = HashSet::new();
        RuleVisitor::new(&known).check(&parse(source).unwrap())
    }

    #[test]
    fn accumulates_all_violations() {
        let result = run("import os\nx = eval('1')\ny = x.__class__");

        match result {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 3);
                assert!(errors.iter().any(|e| matches!(e, SafetyViolation::Import)));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, SafetyViolation::ForbiddenCall { name } if name == "eval")));
                assert!(errors.iter().any(
                    |e| matches!(e, SafetyViolation::RestrictedAttribute { attr } if attr == "__class__")
                ));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn plain_script_passes() {
        assert!(run("x = x + 1\nif x > 3: print('big')").is_success());
    }

    #[test]
    fn allowed_dunder_passes_unknown_dunder_fails() {
        assert!(check_attribute("__len__").is_success());
        assert!(check_attribute("upper").is_success());
        assert!(check_attribute("__weird__").is_failure());
        assert!(check_attribute("f_globals").is_failure());
        assert!(check_attribute("mro").is_failure());
    }

    #[test]
    fn unknown_calls_are_tolerated() {
        let known = HashSet::new();
        assert!(check_call("my_helper", &known).is_success());
        assert!(check_call("open", &known).is_failure());
    }

    #[test]
    fn denied_name_reference_is_rejected() {
        assert!(run("f = exec").is_failure());
    }

    #[test]
    fn from_import_is_rejected() {
        let result = run("from os import path");
        if let Validation::Failure(errors) = result {
            assert!(errors.iter().any(|e| matches!(e, SafetyViolation::ImportFrom)));
        } else {
            panic!("Expected failure");
        }
    }
}
