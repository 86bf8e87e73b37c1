//! Running machines.
//!
//! A [`Runtime`] owns one built [`Machine`], the variables its scripts see,
//! and its action log. Entering a superstate starts a nested runtime for
//! that superstate's diagram; exiting it tears the nested runtime down.

mod lifecycle;
pub mod machine;
mod options;
mod stepper;

pub use lifecycle::Lifecycle;
pub use machine::{Dispatch, Machine, MachineHooks, StateNode, TransitionNode};
pub use options::RuntimeOptions;
pub use stepper::{Runtime, StepReport};
