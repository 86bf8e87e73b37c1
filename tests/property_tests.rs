//! Property-based tests for machine construction and stepping.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated machines and event sequences.

use bsm_engine::{Lifecycle, MachineSpec, Runtime, StateSpec, TransitionSpec, Value};
use proptest::prelude::*;

/// A ring of `count` states `S0 -> S1 -> ... -> S0` on event `next`.
fn ring(count: usize, initial: Option<usize>) -> MachineSpec {
    let mut spec = MachineSpec::new();
    for i in 0..count {
        let mut state = StateSpec::new(format!("S{i}"))
            .entry("ticks = 0")
            .during("ticks = ticks + 1");
        if initial == Some(i) {
            state = state.initial();
        }
        spec = spec.state(state);
    }
    for i in 0..count {
        let target = format!("S{}", (i + 1) % count);
        spec = spec.transition(TransitionSpec::new(format!("S{i}"), target).on("next"));
    }
    spec
}

prop_compose! {
    fn ring_with_initial()(count in 1..6usize)(
        count in Just(count),
        initial in prop::option::of(0..count),
    ) -> (usize, Option<usize>) {
        (count, initial)
    }
}

prop_compose! {
    fn event_sequence()(events in prop::collection::vec(
        prop_oneof![Just(Some("next")), Just(None), Just(Some("unknown"))],
        0..12,
    )) -> Vec<Option<&'static str>> {
        events
    }
}

fn faulting_condition() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("1 / 0 > 0"),
        Just("missing_variable > 3"),
        Just("'a' + 1"),
        Just("[1, 2][9] == 1"),
        Just("{'k': 1}['nope']"),
        Just("int('abc') == 0"),
        Just("undefined_call()"),
        Just("x ="),
    ]
}

proptest! {
    #[test]
    fn initial_state_is_flagged_or_first((count, initial) in ring_with_initial()) {
        let runtime = Runtime::new(&ring(count, initial), false).unwrap();
        let expected = format!("S{}", initial.unwrap_or(0));
        prop_assert_eq!(runtime.current_leaf_state_name(), expected);
        prop_assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
    }

    #[test]
    fn missing_initial_flag_is_warned((count, _) in ring_with_initial()) {
        let mut runtime = Runtime::new(&ring(count, None), false).unwrap();
        let log = runtime.drain_log();
        prop_assert!(log.iter().any(|line| line.contains("No initial state explicitly defined")));
    }

    #[test]
    fn ring_follows_events((count, initial) in ring_with_initial(), events in event_sequence()) {
        let mut runtime = Runtime::new(&ring(count, initial), false).unwrap();
        let mut position = initial.unwrap_or(0);

        for event in &events {
            let report = runtime.step(*event).unwrap();
            if *event == Some("next") {
                position = (position + 1) % count;
            }
            prop_assert_eq!(report.state, format!("S{position}"));
        }

        let fired = events.iter().filter(|e| **e == Some("next")).count();
        prop_assert_eq!(runtime.history().transitions().len(), fired);
    }

    #[test]
    fn reset_is_idempotent((count, initial) in ring_with_initial(), events in event_sequence()) {
        let mut runtime = Runtime::new(&ring(count, initial), false).unwrap();
        for event in events {
            runtime.step(event).unwrap();
        }

        runtime.reset().unwrap();
        let first = (runtime.current_state_name(), runtime.variables_snapshot());
        runtime.reset().unwrap();
        let second = (runtime.current_state_name(), runtime.variables_snapshot());

        prop_assert_eq!(&first, &second);
        prop_assert!(runtime.history().is_empty());
        // Only the initial state's entry action has run since the reset.
        prop_assert_eq!(second.1.len(), 1);
        prop_assert_eq!(second.1.get("ticks"), Some(&Value::Int(0)));
    }

    #[test]
    fn faulting_conditions_never_escape(condition in faulting_condition(), halt in any::<bool>()) {
        let spec = MachineSpec::new()
            .state(StateSpec::new("A").initial())
            .state(StateSpec::new("B"))
            .transition(TransitionSpec::new("A", "B").on("go").when(condition));
        let mut runtime = Runtime::new(&spec, halt).unwrap();

        let report = runtime.step(Some("go"));
        prop_assert!(report.is_ok());
        prop_assert_eq!(report.unwrap().state, "A");
        prop_assert!(!runtime.is_halted());
    }

    #[test]
    fn spec_json_roundtrip((count, initial) in ring_with_initial()) {
        let spec = ring(count, initial);
        let json = spec.to_json().unwrap();
        prop_assert_eq!(MachineSpec::from_json(&json).unwrap(), spec);
    }
}
