//! Script fault kinds.

use std::fmt;
use thiserror::Error;

/// Category of a script fault, named after the error a diagram author
/// would recognise from the scripting language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    Syntax,
    Name,
    Type,
    Attribute,
    Index,
    Key,
    Value,
    ZeroDivision,
    Overflow,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "SyntaxError",
            Self::Name => "NameError",
            Self::Type => "TypeError",
            Self::Attribute => "AttributeError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Value => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Overflow => "OverflowError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault raised while parsing or running a script.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: FaultKind,
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl fmt::Display, line: usize, column: usize) -> Self {
        Self::new(
            FaultKind::Syntax,
            format!("{message} (line {line}, offset {column})"),
        )
    }

    pub fn name(name: &str) -> Self {
        Self::new(FaultKind::Name, format!("name '{name}' is not defined"))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Value, message)
    }

    pub fn attribute(type_name: &str, attr: &str) -> Self {
        Self::new(
            FaultKind::Attribute,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    pub fn zero_division() -> Self {
        Self::new(FaultKind::ZeroDivision, "division by zero")
    }

    pub fn overflow() -> Self {
        Self::new(FaultKind::Overflow, "integer overflow")
    }
}

pub type ScriptResult<T> = Result<T, ScriptError>;
