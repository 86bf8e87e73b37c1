//! Static safety analysis of scripts.
//!
//! Every script is parsed and inspected before it may run. The analyzer
//! rejects imports, calls to reflective or I/O-capable builtins, and
//! access to interpreter-internal attribute names. All findings of one
//! script are reported together.
//!
//! # Example
//!
//! ```rust
//! use bsm_engine::safety::{analyze, SafetyViolation};
//! use std::collections::HashSet;
//!
//! let known = HashSet::new();
//! assert!(analyze("x = x + 1", &known).is_ok());
//!
//! let report = analyze("import os; open('f')", &known).unwrap_err();
//! assert_eq!(report.len(), 2);
//! assert!(matches!(report.violations()[0], SafetyViolation::Import));
//! ```

mod rules;
mod violations;

pub use rules::{
    check_attribute, check_call, SafetyCheck, ALLOWED_CALLS, ALLOWED_DUNDERS, DENIED_CALLS,
    RESTRICTED_ATTRIBUTES,
};
pub use violations::{SafetyReport, SafetyViolation};

use crate::script::{ast::Program, parse};
use rules::RuleVisitor;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;

fn inspect(script: &str, known_variables: &HashSet<String>) -> Result<Program, SafetyReport> {
    let program = parse(script).map_err(|err| {
        SafetyReport::new(vec![SafetyViolation::Syntax {
            message: err.message,
        }])
    })?;
    match RuleVisitor::new(known_variables).check(&program) {
        Validation::Success(_) => Ok(program),
        Validation::Failure(errors) => Err(SafetyReport::new(errors.iter().cloned().collect())),
    }
}

/// Statically check `script`. Empty or whitespace-only scripts pass.
///
/// `known_variables` names the variables currently in scope; calls through
/// them are not flagged as unknown.
pub fn analyze(script: &str, known_variables: &HashSet<String>) -> Result<(), SafetyReport> {
    if script.trim().is_empty() {
        return Ok(());
    }
    inspect(script, known_variables).map(|_| ())
}

/// Caching front end to [`analyze`] that also hands back the parsed program.
///
/// The verdict for a script depends only on its text, so results are kept
/// per distinct string for the analyzer's lifetime.
#[derive(Debug, Default)]
pub struct SafetyAnalyzer {
    cache: HashMap<String, Result<Arc<Program>, SafetyReport>>,
}

impl SafetyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze `script`, reusing an earlier verdict for the same text.
    pub fn check(
        &mut self,
        script: &str,
        known_variables: &HashSet<String>,
    ) -> Result<Arc<Program>, SafetyReport> {
        if let Some(verdict) = self.cache.get(script) {
            return verdict.clone();
        }
        let verdict = if script.trim().is_empty() {
            Ok(Arc::new(Program::default()))
        } else {
            inspect(script, known_variables).map(Arc::new)
        };
        self.cache.insert(script.to_string(), verdict.clone());
        verdict
    }

    /// Number of distinct scripts analyzed so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
