//! Findings produced by the safety analyzer.

use std::fmt;
use thiserror::Error;

/// A single reason a script was rejected before execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SafetyViolation {
    /// The script does not parse. Kept apart from security findings.
    #[error("SyntaxError in user code: {message}")]
    Syntax { message: String },

    #[error("SecurityError: Imports (import) are not allowed in FSM code.")]
    Import,

    #[error("SecurityError: From-imports (from ... import) are not allowed in FSM code.")]
    ImportFrom,

    #[error("SecurityError: Calling the function '{name}' is not allowed.")]
    ForbiddenCall { name: String },

    #[error("SecurityError: Access to the attribute '{attr}' is restricted.")]
    RestrictedAttribute { attr: String },

    #[error("SecurityError: Access to the special attribute '{attr}' is restricted.")]
    SpecialAttribute { attr: String },
}

impl SafetyViolation {
    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

/// Every violation found in one script, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyReport {
    violations: Vec<SafetyViolation>,
}

impl SafetyReport {
    pub(crate) fn new(violations: Vec<SafetyViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[SafetyViolation] {
        &self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// True when the script was rejected only because it failed to parse.
    pub fn is_syntax_error(&self) -> bool {
        self.violations.iter().any(SafetyViolation::is_syntax_error)
    }
}

impl fmt::Display for SafetyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SafetyReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_joins_violations() {
        let report = SafetyReport::new(vec![
            SafetyViolation::Import,
            SafetyViolation::ForbiddenCall {
                name: "eval".into(),
            },
        ]);
        assert_eq!(
            report.to_string(),
            "SecurityError: Imports (import) are not allowed in FSM code.; \
             SecurityError: Calling the function 'eval' is not allowed."
        );
        assert!(!report.is_syntax_error());
    }

    #[test]
    fn syntax_error_is_its_own_kind() {
        let report = SafetyReport::new(vec![SafetyViolation::Syntax {
            message: "invalid syntax near ')' (line 1, offset 4)".into(),
        }]);
        assert!(report.is_syntax_error());
        assert!(report.to_string().starts_with("SyntaxError in user code:"));
    }
}
