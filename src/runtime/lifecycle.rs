//! Simulation lifecycle, separate from the user's own states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a runtime is in its own lifecycle.
///
/// `Uninitialized -> Ready <-> Halted`. `Halted` is only reached through an
/// action fault with halting enabled and is left only by `reset()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Ready,
    Halted,
}

impl Lifecycle {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }

    pub fn can_step(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("Uninitialized"),
            Self::Ready => f.write_str("Ready"),
            Self::Halted => f.write_str("Halted"),
        }
    }
}
