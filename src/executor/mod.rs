//! Turning script text into callables that the runtime can invoke.
//!
//! A script is checked by the [`SafetyAnalyzer`] when it is compiled. A
//! rejected script becomes a blocked stub: as an action it does nothing,
//! as a condition it is always false. Approved scripts run in the
//! [`Interpreter`] with the machine's [`VariableScope`] as their only
//! namespace.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::{format_scope, ActionLog, VariableScope};
use crate::safety::{SafetyAnalyzer, SafetyReport};
use crate::script::ast::Program;
use crate::script::{FaultKind, Interpreter, ScriptError};

/// What a script is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Action,
    Condition,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("action"),
            Self::Condition => f.write_str("condition"),
        }
    }
}

/// A runtime fault raised by a script, with enough context to find it.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{} in {kind} '{label}' (state context: {state}): {}. Code: '{source_text}'", .error.kind, .error.message)]
pub struct ScriptFault {
    pub kind: ScriptKind,
    pub label: String,
    pub state: String,
    pub source_text: String,
    pub error: ScriptError,
}

impl ScriptFault {
    pub fn fault_kind(&self) -> FaultKind {
        self.error.kind
    }
}

#[derive(Clone, Debug)]
enum Verdict {
    Approved(Arc<Program>),
    Blocked(SafetyReport),
}

/// A script bound to its kind and label, ready to run.
#[derive(Clone, Debug)]
pub struct CompiledScript {
    kind: ScriptKind,
    label: String,
    source: String,
    verdict: Verdict,
}

impl CompiledScript {
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.verdict, Verdict::Blocked(_))
    }

    /// The analyzer's findings when the script was rejected.
    pub fn safety_report(&self) -> Option<&SafetyReport> {
        match &self.verdict {
            Verdict::Blocked(report) => Some(report),
            Verdict::Approved(_) => None,
        }
    }

    fn fault(&self, state: &str, error: ScriptError) -> ScriptFault {
        ScriptFault {
            kind: self.kind,
            label: self.label.clone(),
            state: state.to_string(),
            source_text: self.source.clone(),
            error,
        }
    }

    fn flush_output(interp: &mut Interpreter, log: &mut ActionLog) {
        for line in interp.take_output() {
            log.info(format!("[Script Output] {line}"));
        }
    }

    /// Run as an action. Faults are logged here and handed back so the
    /// caller can decide whether they halt the machine.
    pub fn run_action(
        &self,
        scope: &mut VariableScope,
        state: &str,
        log: &mut ActionLog,
    ) -> Result<(), ScriptFault> {
        let program = match &self.verdict {
            Verdict::Blocked(_) => {
                log.warn(format!(
                    "[Action Blocked by Safety Check] Unsafe code ignored: '{}'.",
                    self.source
                ));
                return Ok(());
            }
            Verdict::Approved(program) => program,
        };

        log.info(format!(
            "[Action Runtime] Executing: '{}' in state '{state}' for '{}' with vars: {}",
            self.source,
            self.label,
            format_scope(scope)
        ));
        let mut interp = Interpreter::new();
        let result = interp.exec(program, scope);
        Self::flush_output(&mut interp, log);
        match result {
            Ok(()) => {
                log.info(format!(
                    "[Action Runtime] Finished: '{}'. Variables now: {}",
                    self.source,
                    format_scope(scope)
                ));
                Ok(())
            }
            Err(error) => {
                let fault = self.fault(state, error);
                log.error(format!("[Code Error] {fault}"));
                Err(fault)
            }
        }
    }

    /// Evaluate as a condition. Blocked scripts and faults yield `false`.
    pub fn evaluate_condition(&self, scope: &VariableScope, state: &str, log: &mut ActionLog) -> bool {
        let program = match &self.verdict {
            Verdict::Blocked(_) => {
                log.warn(format!(
                    "[Condition Blocked by Safety Check] Unsafe code: '{}' evaluated as False.",
                    self.source
                ));
                return false;
            }
            Verdict::Approved(program) => program,
        };

        log.info(format!(
            "[Condition Runtime] Executing: '{}' in state '{state}' for '{}' with vars: {}",
            self.source,
            self.label,
            format_scope(scope)
        ));
        let mut interp = Interpreter::new();
        let result = match program.as_expression() {
            Some(expr) => interp.eval(expr, scope),
            None => Err(ScriptError::new(
                FaultKind::Syntax,
                "a condition must be a single expression",
            )),
        };
        Self::flush_output(&mut interp, log);
        match result {
            Ok(value) => {
                log.info(format!(
                    "[Condition Runtime] Result of '{}': {value}",
                    self.source
                ));
                value.is_truthy()
            }
            Err(error) => {
                let fault = self.fault(state, error);
                log.error(format!("[Code Error] {fault}"));
                false
            }
        }
    }
}

/// Compiles scripts, sharing one analysis cache across a machine tree.
#[derive(Debug, Default)]
pub struct ScriptExecutor {
    analyzer: SafetyAnalyzer,
    reported: HashSet<String>,
}

impl ScriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a callable for `script`. Blank scripts yield `None`.
    ///
    /// A safety failure is logged the first time a given script text is
    /// seen; later compilations of the same text stay silent.
    pub fn make_callable(
        &mut self,
        script: &str,
        kind: ScriptKind,
        label: &str,
        known_variables: &HashSet<String>,
        log: &mut ActionLog,
    ) -> Option<CompiledScript> {
        if script.trim().is_empty() {
            return None;
        }
        let verdict = match self.analyzer.check(script, known_variables) {
            Ok(program) => Verdict::Approved(program),
            Err(report) => {
                if self.reported.insert(script.to_string()) {
                    log.warn(format!(
                        "[Safety Check Failed] SecurityError: Code execution blocked for '{label}'. Reason: {report}"
                    ));
                }
                Verdict::Blocked(report)
            }
        };
        Some(CompiledScript {
            kind,
            label: label.to_string(),
            source: script.to_string(),
            verdict,
        })
    }

    pub fn analyzed_scripts(&self) -> usize {
        self.analyzer.cached()
    }
}
