//! Declarative machine descriptions consumed by the builder.
//!
//! A `MachineSpec` is what the diagram editor hands over: a flat list of
//! states and transitions, where any state may carry a nested
//! `MachineSpec` of its own. The engine never persists these; callers
//! keep the diagram and rebuild the runtime from it.

use crate::builder::FsmError;
use serde::{Deserialize, Serialize};

/// One state of a machine level.
///
/// # Example
///
/// ```rust
/// use bsm_engine::core::StateSpec;
///
/// let idle = StateSpec::new("Idle").initial().entry("count = 0");
/// assert!(idle.is_initial);
/// assert_eq!(idle.entry_action.as_deref(), Some("count = 0"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// Unique within its machine level
    pub name: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub during_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_action: Option<String>,
    #[serde(default)]
    pub is_superstate: bool,
    /// Nested machine, only consulted when `is_superstate` is set
    #[serde(
        default,
        alias = "sub_fsm_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_machine: Option<MachineSpec>,
}

impl StateSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn entry(mut self, script: impl Into<String>) -> Self {
        self.entry_action = Some(script.into());
        self
    }

    pub fn during(mut self, script: impl Into<String>) -> Self {
        self.during_action = Some(script.into());
        self
    }

    pub fn exit(mut self, script: impl Into<String>) -> Self {
        self.exit_action = Some(script.into());
        self
    }

    /// Mark this state as a superstate owning `machine`.
    pub fn superstate(mut self, machine: MachineSpec) -> Self {
        self.is_superstate = true;
        self.sub_machine = Some(machine);
        self
    }

    /// The nested machine if this superstate has at least one state.
    pub(crate) fn active_sub_machine(&self) -> Option<&MachineSpec> {
        if !self.is_superstate {
            return None;
        }
        self.sub_machine.as_ref().filter(|m| !m.states.is_empty())
    }
}

/// A transition between two states of the same machine level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub source: String,
    pub target: String,
    /// Empty or missing events get a synthesized internal id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl TransitionSpec {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn action(mut self, script: impl Into<String>) -> Self {
        self.action = Some(script.into());
        self
    }
}

/// A complete machine level: its states and the transitions between them.
///
/// # Example
///
/// ```rust
/// use bsm_engine::core::{MachineSpec, StateSpec, TransitionSpec};
///
/// let spec = MachineSpec::new()
///     .state(StateSpec::new("A").initial())
///     .state(StateSpec::new("B"))
///     .transition(TransitionSpec::new("A", "B").on("go"));
///
/// let json = spec.to_json().unwrap();
/// assert_eq!(MachineSpec::from_json(&json).unwrap(), spec);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSpec {
    #[serde(default)]
    pub states: Vec<StateSpec>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
}

impl MachineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: StateSpec) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, transition: TransitionSpec) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Parse the diagram JSON written by the editor.
    pub fn from_json(json: &str) -> Result<Self, FsmError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, FsmError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn find_state(&self, name: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_json_with_sub_fsm_data_parses() {
        let json = r#"{
            "states": [
                {"name": "Idle", "is_initial": true, "entry_action": "n = 0"},
                {"name": "Work", "is_superstate": true,
                 "sub_fsm_data": {
                    "states": [{"name": "S1", "is_initial": true}],
                    "transitions": [],
                    "comments": []
                 }}
            ],
            "transitions": [
                {"source": "Idle", "target": "Work", "event": "start"}
            ]
        }"#;

        let spec = MachineSpec::from_json(json).unwrap();
        assert_eq!(spec.states.len(), 2);
        let work = spec.find_state("Work").unwrap();
        assert!(work.active_sub_machine().is_some());
        assert_eq!(spec.transitions[0].event.as_deref(), Some("start"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let result = MachineSpec::from_json("{\"states\": 3}");
        assert!(matches!(result, Err(FsmError::InvalidDescription(_))));
    }

    #[test]
    fn empty_sub_machine_is_not_active() {
        let state = StateSpec::new("Super").superstate(MachineSpec::new());
        assert!(state.is_superstate);
        assert!(state.active_sub_machine().is_none());
    }

    #[test]
    fn sub_machine_ignored_without_superstate_flag() {
        let mut state = StateSpec::new("Plain");
        state.sub_machine = Some(MachineSpec::new().state(StateSpec::new("X")));
        assert!(state.active_sub_machine().is_none());
    }

    #[test]
    fn builder_helpers_fill_fields() {
        let t = TransitionSpec::new("A", "B")
            .on("go")
            .when("x > 1")
            .action("y = 2");
        assert_eq!(t.source, "A");
        assert_eq!(t.target, "B");
        assert_eq!(t.condition.as_deref(), Some("x > 1"));
        assert_eq!(t.action.as_deref(), Some("y = 2"));
    }
}
