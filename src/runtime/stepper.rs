//! The runtime that drives one machine level and its active sub-machine.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::builder::{FsmError, MachineBuilder};
use crate::core::{ActionLog, MachineSpec, TransitionHistory, TransitionRecord, Value, VariableScope};
use crate::executor::{CompiledScript, ScriptExecutor};
use crate::runtime::lifecycle::Lifecycle;
use crate::runtime::machine::{Dispatch, Machine, MachineHooks, StateNode, SubMachine};
use crate::runtime::options::RuntimeOptions;

/// Result of a successful `step`: the state afterwards and what was logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// Composite name, e.g. `"Processing (SubActive)"`
    pub state: String,
    pub log: Vec<String>,
}

/// Everything a level owns apart from its machine graph.
#[derive(Debug)]
struct Level {
    scope: VariableScope,
    log: ActionLog,
    options: RuntimeOptions,
    child: Option<Box<Runtime>>,
    active_superstate: Option<String>,
}

impl Level {
    /// Run an action; a fault is an error only when halting is enabled.
    fn run_action(&mut self, script: &CompiledScript, state: &str) -> Result<(), FsmError> {
        match script.run_action(&mut self.scope, state, &mut self.log) {
            Ok(()) => Ok(()),
            Err(fault) if self.options.halt_on_action_error => Err(FsmError::Halted(fault)),
            Err(_) => Ok(()),
        }
    }

    fn start_child(&mut self, state: &StateNode) -> Result<(), FsmError> {
        let machine = match &state.sub_machine {
            SubMachine::Ready(machine) => machine,
            SubMachine::Invalid(message) => {
                return self.child_failed(&state.name, message.clone());
            }
            SubMachine::None => {
                self.log.info(format!(
                    "Superstate '{}' has no defined sub-machine data or states.",
                    state.name
                ));
                return Ok(());
            }
        };

        self.log.info(format!(
            "Superstate '{}' entered. Initializing its sub-machine.",
            state.name
        ));
        match Runtime::start((**machine).clone(), self.options.nested()) {
            Ok(mut child) => {
                self.log.absorb(child.drain_log());
                self.child = Some(Box::new(child));
                self.active_superstate = Some(state.name.clone());
                Ok(())
            }
            Err(FsmError::StartupHalted { fault, mut runtime }) => {
                self.log.absorb(runtime.drain_log());
                self.child_failed(&state.name, fault.to_string())
            }
            Err(other) => self.child_failed(&state.name, other.to_string()),
        }
    }

    fn child_failed(&mut self, state: &str, message: String) -> Result<(), FsmError> {
        self.log.error(format!(
            "ERROR initializing sub-machine for '{state}': {message}"
        ));
        if self.options.halt_on_action_error {
            return Err(FsmError::SubMachineInit {
                state: state.to_string(),
                message,
            });
        }
        Ok(())
    }

    fn stop_child(&mut self, state: &str) {
        if self.active_superstate.as_deref() != Some(state) {
            return;
        }
        if let Some(mut child) = self.child.take() {
            self.log.info(format!(
                "Superstate '{state}' exited. Terminating its sub-machine."
            ));
            self.log.absorb(child.drain_log());
        }
        self.active_superstate = None;
    }
}

impl MachineHooks for Level {
    fn evaluate_condition(&mut self, condition: &CompiledScript, state: &StateNode) -> bool {
        condition.evaluate_condition(&self.scope, &state.name, &mut self.log)
    }

    fn before_transition(&mut self, event: &str, source: &StateNode, target: &StateNode) {
        self.log.info(format!(
            "Before transition on '{event}' from '{}' to '{}'",
            source.name, target.name
        ));
    }

    fn on_exit_state(&mut self, state: &StateNode) -> Result<(), FsmError> {
        self.log.info(format!("Exiting state: {}", state.name));
        self.stop_child(&state.name);
        match &state.exit {
            Some(exit) => self.run_action(exit, &state.name),
            None => Ok(()),
        }
    }

    fn on_transition_action(
        &mut self,
        action: &CompiledScript,
        source: &StateNode,
    ) -> Result<(), FsmError> {
        self.run_action(action, &source.name)
    }

    fn on_enter_state(&mut self, state: &StateNode) -> Result<(), FsmError> {
        self.log.info(format!("Entering state: {}", state.name));
        if state.is_superstate {
            self.start_child(state)?;
        }
        match &state.entry {
            Some(entry) => self.run_action(entry, &state.name),
            None => Ok(()),
        }
    }

    fn after_transition(&mut self, event: &str, source: &StateNode, target: &StateNode) {
        self.log.info(format!(
            "After transition on '{event}' from '{}' to '{}'",
            source.name, target.name
        ));
    }
}

/// A running machine: its current state, variables, log and, while a
/// superstate is active, the nested runtime for that superstate.
///
/// # Example
///
/// ```rust
/// use bsm_engine::core::{MachineSpec, StateSpec, TransitionSpec, Value};
/// use bsm_engine::runtime::Runtime;
///
/// let spec = MachineSpec::new()
///     .state(StateSpec::new("A").initial().entry("x = 0"))
///     .state(StateSpec::new("B").during("x = x + 1"))
///     .transition(TransitionSpec::new("A", "B").on("go"));
///
/// let mut runtime = Runtime::new(&spec, false).unwrap();
/// assert_eq!(runtime.current_leaf_state_name(), "A");
///
/// runtime.step(Some("go")).unwrap();
/// let report = runtime.step(None).unwrap();
/// assert_eq!(report.state, "B");
/// assert_eq!(runtime.variables_snapshot()["x"], Value::Int(1));
/// ```
#[derive(Debug)]
pub struct Runtime {
    machine: Machine,
    level: Level,
    lifecycle: Lifecycle,
    history: TransitionHistory,
}

impl Runtime {
    /// Build and start a runtime with default options apart from the
    /// halt policy.
    pub fn new(spec: &MachineSpec, halt_on_action_error: bool) -> Result<Self, FsmError> {
        Self::with_options(
            spec,
            RuntimeOptions::new().halt_on_action_error(halt_on_action_error),
        )
    }

    /// Build and start a runtime.
    ///
    /// Structural problems in `spec` are returned as errors. If activating
    /// the initial state halts, the halted runtime comes back inside
    /// [`FsmError::StartupHalted`].
    pub fn with_options(spec: &MachineSpec, options: RuntimeOptions) -> Result<Self, FsmError> {
        let mut log = ActionLog::new(options.log_prefix.clone());
        let mut executor = ScriptExecutor::new();
        let machine = MachineBuilder::new(&mut executor).build(spec, &mut log)?;
        Self::launch(machine, options, log)
    }

    /// Start a runtime over an already built machine.
    pub(crate) fn start(machine: Machine, options: RuntimeOptions) -> Result<Self, FsmError> {
        let log = ActionLog::new(options.log_prefix.clone());
        Self::launch(machine, options, log)
    }

    fn launch(machine: Machine, options: RuntimeOptions, log: ActionLog) -> Result<Self, FsmError> {
        let mut runtime = Self {
            machine,
            level: Level {
                scope: VariableScope::new(),
                log,
                options,
                child: None,
                active_superstate: None,
            },
            lifecycle: Lifecycle::Uninitialized,
            history: TransitionHistory::new(),
        };
        match runtime.activate() {
            Ok(()) => {
                let message = format!(
                    "FSM Initialized. Current state: {}",
                    runtime.machine.current_state().name
                );
                runtime.level.log.info(message);
                Ok(runtime)
            }
            Err(fault) => Err(FsmError::StartupHalted {
                fault: Box::new(fault),
                runtime: Box::new(runtime),
            }),
        }
    }

    fn activate(&mut self) -> Result<(), FsmError> {
        match self.machine.enter_initial(&mut self.level) {
            Ok(()) => {
                self.lifecycle = Lifecycle::Ready;
                Ok(())
            }
            Err(err) => {
                self.halt(&err);
                Err(err)
            }
        }
    }

    fn halt(&mut self, err: &FsmError) {
        self.lifecycle = Lifecycle::Halted;
        self.level
            .log
            .error(format!("[SIMULATION HALTED internally] {err}"));
    }

    /// Return to the initial state with an empty scope.
    ///
    /// Scripts are not re-analyzed; the machine built at construction is
    /// reused. Allowed from any lifecycle state.
    pub fn reset(&mut self) -> Result<(), FsmError> {
        self.level.log.info("--- FSM Resetting ---");
        self.level.scope.clear();
        self.history = TransitionHistory::new();
        self.lifecycle = Lifecycle::Uninitialized;
        if let Some(mut child) = self.level.child.take() {
            self.level.log.info("Resetting active sub-machine...");
            if let Err(err) = child.reset() {
                tracing::debug!(
                    target: "bsm_engine",
                    error = %err,
                    "sub-machine halted while resetting"
                );
            }
            self.level.log.absorb(child.drain_log());
        }
        self.level.active_superstate = None;

        self.activate()?;
        let message = format!(
            "FSM Reset. Current state: {}",
            self.machine.current_state().name
        );
        self.level.log.info(message);
        Ok(())
    }

    /// Advance one tick, optionally dispatching `event`.
    ///
    /// The current state's during action runs first, then the active
    /// sub-machine takes an internal step, then the event is dispatched.
    /// On error the runtime is halted and the lines logged so far stay
    /// buffered for [`drain_log`](Self::drain_log).
    pub fn step(&mut self, event: Option<&str>) -> Result<StepReport, FsmError> {
        let label = event.unwrap_or("Internal");
        if self.lifecycle.is_halted() {
            self.level.log.warn(format!(
                "Simulation HALTED. Event '{label}' ignored. Reset required."
            ));
            return Ok(self.report());
        }

        let message = format!(
            "--- Step. State: {}. Event: {label} ---",
            self.current_state_name()
        );
        self.level.log.info(message);

        if let Err(err) = self.advance(event) {
            self.halt(&err);
            return Err(err);
        }
        Ok(self.report())
    }

    fn report(&mut self) -> StepReport {
        StepReport {
            state: self.current_state_name(),
            log: self.level.log.drain(),
        }
    }

    fn advance(&mut self, event: Option<&str>) -> Result<(), FsmError> {
        let current = self.machine.current_state();
        let name = current.name.clone();
        if let Some(during) = &current.during {
            self.level.log.info(format!(
                "During action for '{name}': {}",
                during.source()
            ));
            self.level.run_action(during, &name)?;
        }

        self.step_child(&name)?;

        match event {
            Some(event) => {
                self.level.log.info(format!("Sending event '{event}' to FSM."));
                match self.machine.dispatch(event, &mut self.level)? {
                    Dispatch::Fired { from, to } => {
                        self.history = self.history.record(TransitionRecord {
                            from,
                            to,
                            event: event.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                    Dispatch::UnknownEvent => {
                        self.level
                            .log
                            .warn(format!("Event '{event}' not defined on FSM."));
                    }
                    Dispatch::NotAllowed => {
                        self.level.log.info(format!(
                            "Event '{event}' not allowed or no transition from '{name}'."
                        ));
                    }
                }
            }
            None if self.level.child.is_none() => {
                self.level.log.info(format!(
                    "No event. 'During' actions done. State remains '{name}'."
                ));
            }
            None => {}
        }
        Ok(())
    }

    /// Internal step of the active sub-machine, with completion signalling.
    fn step_child(&mut self, state: &str) -> Result<(), FsmError> {
        let Some(child) = self.level.child.as_mut() else {
            return Ok(());
        };
        let superstate = self
            .level
            .active_superstate
            .clone()
            .unwrap_or_else(|| state.to_string());
        self.level.log.info(format!(
            "Internal step for sub-machine in '{superstate}'."
        ));

        let outcome = child.step(None);
        let propagated = match outcome {
            Ok(report) => {
                self.level.log.absorb(report.log);
                child.is_halted().then(|| FsmError::SubMachineHalted {
                    state: superstate.clone(),
                })
            }
            Err(err) => {
                self.level.log.absorb(child.drain_log());
                Some(err)
            }
        };
        if let Some(err) = propagated {
            self.level.log.error(format!(
                "Propagation: Parent HALTED due to sub-machine error in '{superstate}'."
            ));
            return Err(err);
        }

        if child.machine.is_final() {
            let leaf = child.machine.current_state().name.clone();
            self.level.log.info(format!(
                "Sub-machine in '{superstate}' reached final state: '{leaf}'."
            ));
            let flag = format!("{superstate}_sub_completed");
            self.level.scope.insert(flag.clone(), Value::Bool(true));
            self.level
                .log
                .info(format!("Variable '{flag}' set to True in parent FSM."));
        }
        Ok(())
    }

    /// Current state, with active sub-machine states in parentheses.
    pub fn current_state_name(&self) -> String {
        let name = self.machine.current_state().name();
        match &self.level.child {
            Some(child) => format!("{name} ({})", child.current_state_name()),
            None => name.to_string(),
        }
    }

    /// The deepest active state.
    pub fn current_leaf_state_name(&self) -> String {
        match &self.level.child {
            Some(child) => child.current_leaf_state_name(),
            None => self.machine.current_state().name().to_string(),
        }
    }

    pub fn variables(&self) -> &VariableScope {
        &self.level.scope
    }

    pub fn variables_snapshot(&self) -> VariableScope {
        self.level.scope.clone()
    }

    /// Events with a transition out of the current state at this level or
    /// any active nested level, sorted and deduplicated.
    pub fn possible_events(&self) -> Vec<String> {
        let mut events: BTreeSet<String> = self
            .machine
            .enabled_events()
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(child) = &self.level.child {
            events.extend(child.possible_events());
        }
        events.into_iter().collect()
    }

    /// Take every buffered log line.
    pub fn drain_log(&mut self) -> Vec<String> {
        self.level.log.drain()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_halted(&self) -> bool {
        self.lifecycle.is_halted()
    }

    pub fn history(&self) -> &TransitionHistory {
        &self.history
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.level.options
    }

    pub fn active_superstate(&self) -> Option<&str> {
        self.level.active_superstate.as_deref()
    }

    pub fn active_sub_machine(&self) -> Option<&Runtime> {
        self.level.child.as_deref()
    }

    /// The active sub-machine, for stepping it directly. Its log lines are
    /// returned by its own `step` and any leftovers reach this runtime on
    /// the next step or when the superstate exits.
    pub fn active_sub_machine_mut(&mut self) -> Option<&mut Runtime> {
        self.level.child.as_deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StateSpec, TransitionSpec};
    use crate::runtime::Lifecycle;

    fn counter_spec() -> MachineSpec {
        MachineSpec::new()
            .state(StateSpec::new("A").initial().entry("x = 0"))
            .state(StateSpec::new("B").during("x = x + 1"))
            .transition(TransitionSpec::new("A", "B").on("go"))
    }

    fn hierarchical_spec() -> MachineSpec {
        let sub = MachineSpec::new()
            .state(StateSpec::new("SubIdle").initial().entry("sub_var = 10"))
            .state(StateSpec::new("SubDone").terminal())
            .transition(TransitionSpec::new("SubIdle", "SubDone").on("finish"));
        MachineSpec::new()
            .state(StateSpec::new("Idle").initial())
            .state(
                StateSpec::new("Processing")
                    .superstate(sub)
                    .exit("left = True"),
            )
            .state(StateSpec::new("Done").terminal())
            .transition(TransitionSpec::new("Idle", "Processing").on("start"))
            .transition(
                TransitionSpec::new("Processing", "Done")
                    .on("auto_finish")
                    .when("Processing_sub_completed == True"),
            )
    }

    #[test]
    fn initialization_logs_and_runs_entry() {
        let mut runtime = Runtime::new(&counter_spec(), false).unwrap();
        assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
        assert_eq!(runtime.variables()["x"], Value::Int(0));
        let log = runtime.drain_log();
        assert_eq!(log.first().map(String::as_str), Some("Entering state: A"));
        assert_eq!(
            log.last().map(String::as_str),
            Some("FSM Initialized. Current state: A")
        );
    }

    #[test]
    fn step_trace_order() {
        let mut runtime = Runtime::new(&counter_spec(), false).unwrap();
        runtime.drain_log();

        let report = runtime.step(Some("go")).unwrap();
        assert_eq!(report.state, "B");
        assert_eq!(
            report.log,
            vec![
                "--- Step. State: A. Event: go ---",
                "Sending event 'go' to FSM.",
                "Before transition on 'go' from 'A' to 'B'",
                "Exiting state: A",
                "Entering state: B",
                "After transition on 'go' from 'A' to 'B'",
            ]
        );
        assert_eq!(runtime.history().path(), vec!["A", "B"]);
    }

    #[test]
    fn unknown_and_rejected_events_are_logged() {
        let mut runtime = Runtime::new(&counter_spec(), false).unwrap();
        let report = runtime.step(Some("nope")).unwrap();
        assert!(report.log.contains(&"Event 'nope' not defined on FSM.".to_string()));

        runtime.step(Some("go")).unwrap();
        let report = runtime.step(Some("go")).unwrap();
        assert!(report
            .log
            .contains(&"Event 'go' not allowed or no transition from 'B'.".to_string()));
        assert_eq!(report.state, "B");
    }

    #[test]
    fn superstate_runs_sub_machine() {
        let mut runtime = Runtime::new(&hierarchical_spec(), false).unwrap();
        let report = runtime.step(Some("start")).unwrap();

        assert_eq!(report.state, "Processing (SubIdle)");
        assert_eq!(runtime.current_leaf_state_name(), "SubIdle");
        assert_eq!(runtime.active_superstate(), Some("Processing"));
        assert!(report
            .log
            .contains(&"Superstate 'Processing' entered. Initializing its sub-machine.".to_string()));
        assert!(report
            .log
            .contains(&"  [SUB] FSM Initialized. Current state: SubIdle".to_string()));

        let sub = runtime.active_sub_machine().unwrap();
        assert_eq!(sub.variables()["sub_var"], Value::Int(10));
        assert!(runtime.variables().get("sub_var").is_none());
        assert_eq!(runtime.possible_events(), vec!["auto_finish", "finish"]);
    }

    #[test]
    fn sub_machine_completion_sets_parent_flag() {
        let mut runtime = Runtime::new(&hierarchical_spec(), false).unwrap();
        runtime.step(Some("start")).unwrap();
        runtime
            .active_sub_machine_mut()
            .unwrap()
            .step(Some("finish"))
            .unwrap();

        let report = runtime.step(None).unwrap();
        assert_eq!(report.state, "Processing (SubDone)");
        assert_eq!(
            runtime.variables().get("Processing_sub_completed"),
            Some(&Value::Bool(true))
        );

        let report = runtime.step(Some("auto_finish")).unwrap();
        assert_eq!(report.state, "Done");
        assert!(runtime.active_sub_machine().is_none());
        assert!(report
            .log
            .contains(&"Superstate 'Processing' exited. Terminating its sub-machine.".to_string()));
        assert_eq!(runtime.variables().get("left"), Some(&Value::Bool(true)));
    }

    #[test]
    fn action_fault_is_swallowed_by_default() {
        let spec = MachineSpec::new()
            .state(StateSpec::new("A").initial().during("x = 1 / 0"));
        let mut runtime = Runtime::new(&spec, false).unwrap();
        let report = runtime.step(None).unwrap();
        assert!(report.log.iter().any(|l| l.starts_with("[Code Error] ZeroDivisionError")));
        assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
    }

    #[test]
    fn action_fault_halts_when_configured() {
        let spec = MachineSpec::new()
            .state(StateSpec::new("A").initial().during("x = undefined_name"));
        let mut runtime = Runtime::new(&spec, true).unwrap();

        let err = runtime.step(None).unwrap_err();
        assert!(matches!(err, FsmError::Halted(_)));
        assert!(runtime.is_halted());
        assert!(runtime
            .drain_log()
            .iter()
            .any(|l| l.starts_with("[SIMULATION HALTED internally]")));

        let report = runtime.step(Some("anything")).unwrap();
        assert_eq!(
            report.log,
            vec!["Simulation HALTED. Event 'anything' ignored. Reset required."]
        );

        runtime.reset().unwrap();
        assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
    }

    #[test]
    fn sub_machine_halt_propagates() {
        let sub = MachineSpec::new().state(StateSpec::new("Bad").initial().during("boom()"));
        let spec = MachineSpec::new()
            .state(StateSpec::new("Outer").initial().superstate(sub));
        let mut runtime = Runtime::new(&spec, true).unwrap();

        assert!(runtime.step(None).is_err());
        assert!(runtime.is_halted());
        assert!(runtime
            .drain_log()
            .contains(&"Propagation: Parent HALTED due to sub-machine error in 'Outer'.".to_string()));
    }

    #[test]
    fn broken_sub_machine_is_logged_on_entry() {
        let sub = MachineSpec::new()
            .state(StateSpec::new("X").initial())
            .state(StateSpec::new("Y").initial());
        let spec = MachineSpec::new()
            .state(StateSpec::new("Outer").initial().superstate(sub));
        let mut runtime = Runtime::new(&spec, false).unwrap();
        assert!(runtime
            .drain_log()
            .iter()
            .any(|l| l.starts_with("ERROR initializing sub-machine for 'Outer'")));
        assert!(runtime.active_sub_machine().is_none());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut runtime = Runtime::new(&hierarchical_spec(), false).unwrap();
        runtime.step(Some("start")).unwrap();
        runtime.reset().unwrap();

        assert_eq!(runtime.current_state_name(), "Idle");
        assert!(runtime.variables().is_empty());
        assert!(runtime.history().is_empty());
        let log = runtime.drain_log();
        assert_eq!(log.first().map(String::as_str), Some("--- FSM Resetting ---"));
        assert_eq!(log.last().map(String::as_str), Some("FSM Reset. Current state: Idle"));
    }
}
