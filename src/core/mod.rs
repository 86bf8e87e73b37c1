//! Core data model shared by every layer of the engine.
//!
//! - Declarative machine descriptions (`MachineSpec`, `StateSpec`, `TransitionSpec`)
//! - Script values and the per-level `VariableScope`
//! - The drainable `ActionLog`
//! - `TransitionHistory` of fired transitions

mod history;
mod log;
mod spec;
mod value;

pub use history::{TransitionHistory, TransitionRecord};
pub use log::{ActionLog, LogLevel};
pub use spec::{MachineSpec, StateSpec, TransitionSpec};
pub use value::{format_scope, Value, VariableScope};

pub(crate) use value::Number;
