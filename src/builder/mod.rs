//! Building runnable machines from declarative descriptions.
//!
//! The builder validates structure (state names, the initial state),
//! resolves transition endpoints and events, and compiles every script
//! once. Nested diagrams of superstates are built along with their parent.

pub mod error;
pub mod machine;

pub use error::FsmError;
pub use machine::{MachineBuilder, SUB_MACHINE_LOG_PREFIX};

use crate::core::{ActionLog, MachineSpec};
use crate::executor::ScriptExecutor;
use crate::runtime::Machine;

/// Build a top-level machine with a fresh executor.
///
/// # Example
///
/// ```
/// use bsm_engine::builder::build_machine;
/// use bsm_engine::core::{ActionLog, MachineSpec, StateSpec};
///
/// let spec = MachineSpec::new().state(StateSpec::new("Solo").initial());
/// let mut log = ActionLog::default();
/// let machine = build_machine(&spec, &mut log).unwrap();
///
/// assert_eq!(machine.current_state().name(), "Solo");
/// ```
pub fn build_machine(spec: &MachineSpec, log: &mut ActionLog) -> Result<Machine, FsmError> {
    let mut executor = ScriptExecutor::new();
    MachineBuilder::new(&mut executor).build(spec, log)
}
