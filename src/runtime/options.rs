//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// How a runtime reacts to faults and how it labels its log lines.
///
/// Missing fields take their defaults when deserialized:
///
/// ```rust
/// use bsm_engine::runtime::RuntimeOptions;
///
/// let options: RuntimeOptions = serde_json::from_str(r#"{"halt_on_action_error": true}"#).unwrap();
/// assert!(options.halt_on_action_error);
/// assert_eq!(options.log_prefix, "");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Halt the machine when an action script faults, instead of logging
    /// the fault and carrying on
    pub halt_on_action_error: bool,
    /// Prepended to every line this runtime logs
    pub log_prefix: String,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt_on_action_error(mut self, halt: bool) -> Self {
        self.halt_on_action_error = halt;
        self
    }

    pub fn log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = prefix.into();
        self
    }

    /// Options for a sub-machine: same fault policy, one level deeper prefix.
    pub(crate) fn nested(&self) -> Self {
        Self {
            halt_on_action_error: self.halt_on_action_error,
            log_prefix: format!(
                "{}{}",
                self.log_prefix,
                crate::builder::SUB_MACHINE_LOG_PREFIX
            ),
        }
    }
}
