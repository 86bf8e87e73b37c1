//! Errors raised while building or running a machine.

use thiserror::Error;

use crate::executor::ScriptFault;
use crate::runtime::Runtime;

/// Fatal engine errors.
///
/// Structural problems come from building; `Halted` and `StartupHalted`
/// only occur when a runtime was configured to halt on action errors.
#[derive(Debug, Error)]
pub enum FsmError {
    #[error("No states defined in the FSM.")]
    NoStates,

    #[error("Sub-FSM has no states defined.")]
    EmptyMachine,

    #[error("Multiple initial states defined: '{first}' and '{second}'.")]
    MultipleInitialStates { first: String, second: String },

    #[error("State '{0}' is defined more than once.")]
    DuplicateState(String),

    #[error("Invalid machine description: {0}")]
    InvalidDescription(#[from] serde_json::Error),

    #[error("Simulation halted: {0}")]
    Halted(ScriptFault),

    /// Activating the initial state halted. The runtime is returned in its
    /// halted state so callers can inspect its log and `reset()` it.
    #[error("FSM halted during initialization: {fault}")]
    StartupHalted {
        fault: Box<FsmError>,
        runtime: Box<Runtime>,
    },

    #[error("Sub-FSM init failed for {state}: {message}")]
    SubMachineInit { state: String, message: String },

    #[error("Sub-machine in '{state}' is halted.")]
    SubMachineHalted { state: String },
}

impl FsmError {
    /// True for errors that put a runtime into the halted lifecycle.
    pub fn is_halt(&self) -> bool {
        matches!(
            self,
            Self::Halted(_)
                | Self::StartupHalted { .. }
                | Self::SubMachineInit { .. }
                | Self::SubMachineHalted { .. }
        )
    }

    /// The script fault behind a halt, if there was one.
    pub fn script_fault(&self) -> Option<&ScriptFault> {
        match self {
            Self::Halted(fault) => Some(fault),
            Self::StartupHalted { fault, .. } => fault.script_fault(),
            _ => None,
        }
    }

    /// Recover the halted runtime carried by a startup failure.
    pub fn into_runtime(self) -> Option<Runtime> {
        match self {
            Self::StartupHalted { runtime, .. } => Some(*runtime),
            _ => None,
        }
    }
}
