//! Built machine graph and transition dispatch.

use std::collections::{BTreeSet, HashMap};

use crate::builder::FsmError;
use crate::executor::CompiledScript;

/// The nested machine a superstate activates on entry.
#[derive(Clone, Debug)]
pub(crate) enum SubMachine {
    /// Plain state, or a superstate without a usable nested diagram
    None,
    Ready(Box<Machine>),
    /// Nested diagram failed to build; reported when the superstate is entered
    Invalid(String),
}

/// A state with its compiled scripts.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub(crate) name: String,
    pub(crate) is_final: bool,
    pub(crate) is_superstate: bool,
    pub(crate) entry: Option<CompiledScript>,
    pub(crate) during: Option<CompiledScript>,
    pub(crate) exit: Option<CompiledScript>,
    pub(crate) sub_machine: SubMachine,
}

impl StateNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_superstate(&self) -> bool {
        self.is_superstate
    }

    pub fn entry_action(&self) -> Option<&CompiledScript> {
        self.entry.as_ref()
    }

    pub fn during_action(&self) -> Option<&CompiledScript> {
        self.during.as_ref()
    }

    pub fn exit_action(&self) -> Option<&CompiledScript> {
        self.exit.as_ref()
    }

    /// True if entering this state starts a nested machine.
    pub fn has_sub_machine(&self) -> bool {
        matches!(self.sub_machine, SubMachine::Ready(_))
    }
}

/// A resolved transition between two state indices.
#[derive(Clone, Debug)]
pub struct TransitionNode {
    pub(crate) event: String,
    pub(crate) source: usize,
    pub(crate) target: usize,
    pub(crate) condition: Option<CompiledScript>,
    pub(crate) action: Option<CompiledScript>,
}

impl TransitionNode {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn condition(&self) -> Option<&CompiledScript> {
        self.condition.as_ref()
    }

    pub fn action(&self) -> Option<&CompiledScript> {
        self.action.as_ref()
    }
}

/// Callbacks invoked while the machine moves between states.
///
/// The machine owns only the graph and the current-state pointer; the
/// variable scope, log and nested runtime live with the implementor, so a
/// transition can mutate them while the graph is borrowed.
pub trait MachineHooks {
    /// Guard check for a candidate transition out of `state`.
    fn evaluate_condition(&mut self, condition: &CompiledScript, state: &StateNode) -> bool;

    fn before_transition(&mut self, event: &str, source: &StateNode, target: &StateNode);

    /// Leave `state`: tear down what it started, then run its exit action.
    fn on_exit_state(&mut self, state: &StateNode) -> Result<(), FsmError>;

    fn on_transition_action(
        &mut self,
        action: &CompiledScript,
        source: &StateNode,
    ) -> Result<(), FsmError>;

    /// Enter `state`: start its nested machine, then run its entry action.
    fn on_enter_state(&mut self, state: &StateNode) -> Result<(), FsmError>;

    fn after_transition(&mut self, event: &str, source: &StateNode, target: &StateNode);
}

/// What happened to a dispatched event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Fired { from: String, to: String },
    /// No transition anywhere in the machine uses this event
    UnknownEvent,
    /// The event exists but nothing enabled leaves the current state
    NotAllowed,
}

/// One level of a hierarchical machine, ready to run.
#[derive(Clone, Debug)]
pub struct Machine {
    states: Vec<StateNode>,
    index: HashMap<String, usize>,
    transitions: Vec<TransitionNode>,
    events: BTreeSet<String>,
    initial: usize,
    current: usize,
}

impl Machine {
    pub(crate) fn new(states: Vec<StateNode>, transitions: Vec<TransitionNode>, initial: usize) -> Self {
        let index = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let events = transitions.iter().map(|t| t.event.clone()).collect();
        Self {
            states,
            index,
            transitions,
            events,
            initial,
            current: initial,
        }
    }

    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn transitions(&self) -> &[TransitionNode] {
        &self.transitions
    }

    pub fn state(&self, name: &str) -> Option<&StateNode> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn initial_state(&self) -> &StateNode {
        &self.states[self.initial]
    }

    pub fn current_state(&self) -> &StateNode {
        &self.states[self.current]
    }

    pub fn is_final(&self) -> bool {
        self.current_state().is_final
    }

    /// Every event used by some transition of this level.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Events with at least one transition leaving the current state.
    /// Conditions are not evaluated.
    pub fn enabled_events(&self) -> BTreeSet<&str> {
        self.transitions
            .iter()
            .filter(|t| t.source == self.current)
            .map(|t| t.event.as_str())
            .collect()
    }

    /// Point at the initial state and run its entry hooks.
    pub(crate) fn enter_initial<H: MachineHooks>(&mut self, hooks: &mut H) -> Result<(), FsmError> {
        self.current = self.initial;
        hooks.on_enter_state(&self.states[self.initial])
    }

    /// Fire the first transition, in declaration order, that leaves the
    /// current state on `event` and whose condition holds.
    ///
    /// If a hook fails before the target is entered, the machine stays in
    /// the source state.
    pub fn dispatch<H: MachineHooks>(&mut self, event: &str, hooks: &mut H) -> Result<Dispatch, FsmError> {
        if !self.events.contains(event) {
            return Ok(Dispatch::UnknownEvent);
        }

        let source = self.current;
        let chosen = self.transitions.iter().position(|t| {
            t.source == source
                && t.event == event
                && t
                    .condition
                    .as_ref()
                    .map_or(true, |c| hooks.evaluate_condition(c, &self.states[source]))
        });
        let Some(chosen) = chosen else {
            return Ok(Dispatch::NotAllowed);
        };

        let transition = &self.transitions[chosen];
        let target = transition.target;
        let (from, to) = (&self.states[source], &self.states[target]);

        hooks.before_transition(event, from, to);
        hooks.on_exit_state(from)?;
        if let Some(action) = &transition.action {
            hooks.on_transition_action(action, from)?;
        }
        self.current = target;
        let (from, to) = (&self.states[source], &self.states[target]);
        hooks.on_enter_state(to)?;
        hooks.after_transition(event, from, to);

        Ok(Dispatch::Fired {
            from: from.name.clone(),
            to: to.name.clone(),
        })
    }
}
