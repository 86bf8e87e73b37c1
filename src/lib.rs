//! BSM Engine: hierarchical state machine simulation with sandboxed scripts
//!
//! A machine is described declaratively (states, transitions, scripts) and
//! built once. Every script is checked by a static safety analyzer before it
//! can run; rejected scripts are replaced by inert stubs. The runtime then
//! steps the machine, running entry/during/exit actions and transition
//! conditions in a small expression language, and nests a child runtime for
//! every active superstate.
//!
//! # Core Concepts
//!
//! - **Spec**: Serializable description of a machine (`MachineSpec`)
//! - **Safety**: Static rejection of imports, dangerous calls and dunder access
//! - **Executor**: Compiles scripts once into action or condition callables
//! - **Runtime**: Steps the machine and its active sub-machines
//! - **Action log**: The ordered trace of everything that happened
//!
//! # Example
//!
//! ```rust
//! use bsm_engine::{MachineSpec, Runtime, StateSpec, TransitionSpec, Value};
//!
//! let spec = MachineSpec::new()
//!     .state(StateSpec::new("Idle").initial())
//!     .state(StateSpec::new("Busy").during("count += 1"))
//!     .transition(TransitionSpec::new("Idle", "Busy").on("start").action("count = 0"))
//!     .transition(
//!         TransitionSpec::new("Busy", "Idle")
//!             .on("stop")
//!             .when("count >= 2"),
//!     );
//!
//! let mut runtime = Runtime::new(&spec, false).unwrap();
//! runtime.step(Some("start")).unwrap();
//! runtime.step(Some("stop")).unwrap();
//! assert_eq!(runtime.current_state_name(), "Busy");
//!
//! runtime.step(Some("stop")).unwrap();
//! assert_eq!(runtime.current_state_name(), "Idle");
//! assert_eq!(runtime.variables()["count"], Value::Int(2));
//! ```

pub mod builder;
pub mod core;
pub mod executor;
pub mod runtime;
pub mod safety;
pub mod script;

// Re-export commonly used types
pub use builder::FsmError;
pub use core::{ActionLog, MachineSpec, StateSpec, TransitionSpec, Value, VariableScope};
pub use executor::{ScriptExecutor, ScriptFault, ScriptKind};
pub use runtime::{Lifecycle, Runtime, RuntimeOptions, StepReport};
pub use safety::{analyze, SafetyAnalyzer, SafetyReport, SafetyViolation};
