//! The embedded scripting language used by state and transition scripts.
//!
//! A small, Python-flavoured subset: assignments, arithmetic, comparisons,
//! `if`/`while`/`for`, and a fixed table of built-in functions. Scripts are
//! parsed once into an [`ast::Program`] and then run by the [`Interpreter`]
//! against a [`VariableScope`](crate::core::VariableScope).

pub mod ast;
mod builtins;
mod error;
mod interpreter;
mod lexer;
mod parser;

pub use builtins::{is_builtin, lookup as lookup_builtin, Builtin, BUILTINS};
pub use error::{FaultKind, ScriptError, ScriptResult};
pub use interpreter::Interpreter;
pub use parser::parse;
