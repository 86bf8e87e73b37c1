//! Builder turning a `MachineSpec` into a runnable `Machine`.

use std::collections::{HashMap, HashSet};

use crate::builder::error::FsmError;
use crate::core::{ActionLog, MachineSpec, StateSpec};
use crate::executor::{CompiledScript, ScriptExecutor, ScriptKind};
use crate::runtime::machine::{Machine, StateNode, SubMachine, TransitionNode};

/// Prefix appended for each level of nesting in the action log.
pub const SUB_MACHINE_LOG_PREFIX: &str = "  [SUB] ";

/// Builds machines, compiling every script through one shared executor.
///
/// Either the whole machine is built or an error is returned; problems
/// that only affect single scripts or transitions are logged as warnings.
///
/// # Example
///
/// ```rust
/// use bsm_engine::builder::MachineBuilder;
/// use bsm_engine::core::{ActionLog, MachineSpec, StateSpec, TransitionSpec};
/// use bsm_engine::executor::ScriptExecutor;
///
/// let spec = MachineSpec::new()
///     .state(StateSpec::new("Idle").initial())
///     .state(StateSpec::new("Busy"))
///     .transition(TransitionSpec::new("Idle", "Busy").on("start"));
///
/// let mut executor = ScriptExecutor::new();
/// let mut log = ActionLog::default();
/// let machine = MachineBuilder::new(&mut executor).build(&spec, &mut log).unwrap();
///
/// assert_eq!(machine.initial_state().name(), "Idle");
/// assert!(log.is_empty());
/// ```
pub struct MachineBuilder<'a> {
    executor: &'a mut ScriptExecutor,
    nested: bool,
}

impl<'a> MachineBuilder<'a> {
    /// Builder for a top-level machine.
    pub fn new(executor: &'a mut ScriptExecutor) -> Self {
        Self {
            executor,
            nested: false,
        }
    }

    /// Builder for a machine nested inside a superstate.
    pub fn nested(executor: &'a mut ScriptExecutor) -> Self {
        Self {
            executor,
            nested: true,
        }
    }

    pub fn build(mut self, spec: &MachineSpec, log: &mut ActionLog) -> Result<Machine, FsmError> {
        if spec.states.is_empty() {
            return Err(if self.nested {
                FsmError::EmptyMachine
            } else {
                FsmError::NoStates
            });
        }

        let index = index_states(&spec.states)?;
        let initial = select_initial(&spec.states, log)?;
        let no_vars = HashSet::new();

        let mut states = Vec::with_capacity(spec.states.len());
        for state in &spec.states {
            states.push(self.state_node(state, &no_vars, log));
        }

        if spec.transitions.is_empty() {
            log.warn("Warning: FSM has states but no transitions. No events will be defined beyond potential state actions.");
        }

        let mut transitions = Vec::with_capacity(spec.transitions.len());
        for (idx, t) in spec.transitions.iter().enumerate() {
            let event = match t.event.as_deref().filter(|e| !e.trim().is_empty()) {
                Some(event) => event.to_string(),
                None => {
                    let synthetic = synthetic_event(idx, &t.source, &t.target);
                    log.warn(format!(
                        "Warning: Transition {}->{} has no event. Synthetic event ID: {synthetic}",
                        t.source, t.target
                    ));
                    synthetic
                }
            };

            let endpoints = (index.get(t.source.as_str()), index.get(t.target.as_str()));
            let (Some(&source), Some(&target)) = endpoints else {
                log.warn(format!(
                    "Warning: Skipping transition for event '{event}' from '{}' to '{}' due to missing state object(s).",
                    t.source, t.target
                ));
                continue;
            };

            let condition = self.compile(
                t.condition.as_deref(),
                ScriptKind::Condition,
                &format!("cond_t{idx}_{event}"),
                &no_vars,
                log,
            );
            let action = self.compile(
                t.action.as_deref(),
                ScriptKind::Action,
                &format!("action_t{idx}_{event}"),
                &no_vars,
                log,
            );

            transitions.push(TransitionNode {
                event,
                source,
                target,
                condition,
                action,
            });
        }

        tracing::debug!(
            target: "bsm_engine",
            states = states.len(),
            transitions = transitions.len(),
            nested = self.nested,
            "machine built"
        );
        Ok(Machine::new(states, transitions, initial))
    }

    fn compile(
        &mut self,
        script: Option<&str>,
        kind: ScriptKind,
        label: &str,
        known: &HashSet<String>,
        log: &mut ActionLog,
    ) -> Option<CompiledScript> {
        self.executor.make_callable(script?, kind, label, known, log)
    }

    fn state_node(
        &mut self,
        state: &StateSpec,
        known: &HashSet<String>,
        log: &mut ActionLog,
    ) -> StateNode {
        let name = &state.name;
        let mut action = |script: &Option<String>, hook: &str| {
            self.compile(
                script.as_deref(),
                ScriptKind::Action,
                &format!("{hook}_{name}"),
                known,
                log,
            )
        };
        let entry = action(&state.entry_action, "entry");
        let during = action(&state.during_action, "during");
        let exit = action(&state.exit_action, "exit");

        let sub_machine = match state.active_sub_machine() {
            Some(sub) => {
                let mut sub_log = ActionLog::new(format!("{}{SUB_MACHINE_LOG_PREFIX}", log.prefix()));
                let built = MachineBuilder::nested(&mut *self.executor).build(sub, &mut sub_log);
                log.absorb(sub_log.drain());
                match built {
                    Ok(machine) => SubMachine::Ready(Box::new(machine)),
                    Err(err) => SubMachine::Invalid(err.to_string()),
                }
            }
            None => SubMachine::None,
        };

        StateNode {
            name: name.clone(),
            is_final: state.is_final,
            is_superstate: state.is_superstate,
            entry,
            during,
            exit,
            sub_machine,
        }
    }
}

fn index_states(states: &[StateSpec]) -> Result<HashMap<&str, usize>, FsmError> {
    let mut index = HashMap::with_capacity(states.len());
    for (i, state) in states.iter().enumerate() {
        if index.insert(state.name.as_str(), i).is_some() {
            return Err(FsmError::DuplicateState(state.name.clone()));
        }
    }
    Ok(index)
}

/// Exactly one initial state: the flagged one, else the first declared.
fn select_initial(states: &[StateSpec], log: &mut ActionLog) -> Result<usize, FsmError> {
    let mut flagged = states.iter().enumerate().filter(|(_, s)| s.is_initial);
    match (flagged.next(), flagged.next()) {
        (Some((_, first)), Some((_, second))) => Err(FsmError::MultipleInitialStates {
            first: first.name.clone(),
            second: second.name.clone(),
        }),
        (Some((i, _)), None) => Ok(i),
        (None, _) => {
            log.warn(format!(
                "Warning: No initial state explicitly defined. Using first state '{}' as initial.",
                states[0].name
            ));
            Ok(0)
        }
    }
}

/// Event id for a transition declared without one, restricted to `[A-Za-z0-9_]`.
fn synthetic_event(idx: usize, source: &str, target: &str) -> String {
    format!("_internal_t{idx}_{source}_to_{target}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
