//! History of fired transitions.
//!
//! The runtime records one entry per transition it completes. History is
//! cleared on reset along with the variable scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single fired transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state being left
    pub from: String,
    /// The state being entered
    pub to: String,
    /// Event that fired the transition (possibly a synthesized id)
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of fired transitions.
///
/// `record` returns a new history rather than mutating in place.
///
/// # Example
///
/// ```rust
/// use bsm_engine::core::{TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let history = TransitionHistory::new().record(TransitionRecord {
///     from: "Idle".into(),
///     to: "Running".into(),
///     event: "start".into(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.path(), vec!["Idle", "Running"]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionHistory {
    transitions: Vec<TransitionRecord>,
}

impl TransitionHistory {
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    pub fn record(&self, transition: TransitionRecord) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// State names traversed: the first source, then every target.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_str());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_str());
        }
        path
    }

    /// Time between the first and last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.first()?, self.transitions.last()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: &str, to: &str, event: &str) -> TransitionRecord {
        TransitionRecord {
            from: from.into(),
            to: to.into(),
            event: event.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::new();
        assert!(history.is_empty());
        assert!(history.path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = TransitionHistory::new();
        let next = history.record(record("A", "B", "go"));

        assert!(history.is_empty());
        assert_eq!(next.transitions().len(), 1);
    }

    #[test]
    fn path_follows_targets() {
        let history = TransitionHistory::new()
            .record(record("A", "B", "go"))
            .record(record("B", "C", "next"));

        assert_eq!(history.path(), vec!["A", "B", "C"]);
    }

    #[test]
    fn single_transition_has_zero_duration() {
        let history = TransitionHistory::new().record(record("A", "B", "go"));
        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes() {
        let history = TransitionHistory::new().record(record("A", "B", "go"));
        let json = serde_json::to_string(&history).unwrap();
        let back: TransitionHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transitions(), history.transitions());
    }
}
