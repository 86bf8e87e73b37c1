//! End-to-end simulation scenarios.

use bsm_engine::{
    FsmError, Lifecycle, MachineSpec, Runtime, RuntimeOptions, StateSpec, TransitionSpec, Value,
};

fn has_line(log: &[String], needle: &str) -> bool {
    log.iter().any(|line| line.contains(needle))
}

fn processing_spec() -> MachineSpec {
    let sub = MachineSpec::new()
        .state(
            StateSpec::new("SubIdle")
                .initial()
                .entry("sub_var = 10; print('Sub-FSM Idle Entered')"),
        )
        .state(
            StateSpec::new("SubActive")
                .entry("sub_var = sub_var + 5")
                .during("sub_var = sub_var + 1"),
        )
        .state(StateSpec::new("SubDone").terminal().entry("print('Sub-FSM Done')"))
        .transition(TransitionSpec::new("SubIdle", "SubActive").on("start_sub_work"))
        .transition(
            TransitionSpec::new("SubActive", "SubDone")
                .on("finish_sub_work")
                .when("sub_var > 17"),
        );

    MachineSpec::new()
        .state(StateSpec::new("Idle").initial().entry("parent_var = 1"))
        .state(
            StateSpec::new("Processing")
                .superstate(sub)
                .entry("print('Parent Processing Superstate Entered')")
                .during("parent_var = parent_var + 1"),
        )
        .state(StateSpec::new("Done").terminal())
        .transition(TransitionSpec::new("Idle", "Processing").on("start_processing"))
        .transition(
            TransitionSpec::new("Processing", "Done")
                .on("auto_finish")
                .when("Processing_sub_completed == True"),
        )
}

#[test]
fn counter_scenario() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial().entry("x=0"))
        .state(StateSpec::new("B").during("x=x+1"))
        .transition(TransitionSpec::new("A", "B").on("go"));

    let mut runtime = Runtime::new(&spec, false).unwrap();
    assert_eq!(runtime.current_leaf_state_name(), "A");
    assert_eq!(runtime.variables_snapshot().get("x"), Some(&Value::Int(0)));

    runtime.step(Some("go")).unwrap();
    assert_eq!(runtime.current_leaf_state_name(), "B");

    runtime.step(None).unwrap();
    assert_eq!(runtime.current_leaf_state_name(), "B");
    assert_eq!(runtime.variables_snapshot().get("x"), Some(&Value::Int(1)));

    runtime.step(None).unwrap();
    assert_eq!(runtime.variables_snapshot().get("x"), Some(&Value::Int(2)));
}

#[test]
fn halt_during_initialization() {
    let spec = MachineSpec::new().state(StateSpec::new("Err").initial().entry("x = 1/0"));

    let err = Runtime::new(&spec, true).unwrap_err();
    assert!(err.is_halt());
    assert!(err.to_string().contains("ZeroDivisionError"));

    let mut runtime = err.into_runtime().expect("halted runtime is returned");
    assert_eq!(runtime.lifecycle(), Lifecycle::Halted);
    let startup = runtime.drain_log();
    assert!(has_line(&startup, "[Code Error] ZeroDivisionError"));
    assert!(has_line(&startup, "[SIMULATION HALTED internally]"));

    let report = runtime.step(Some("anything")).unwrap();
    assert_eq!(report.state, "Err");
    assert!(has_line(&report.log, "HALTED"));
    assert_eq!(runtime.lifecycle(), Lifecycle::Halted);
}

#[test]
fn same_fault_without_halting_keeps_running() {
    let spec = MachineSpec::new().state(StateSpec::new("Err").initial().entry("x = 1/0"));
    let mut runtime = Runtime::new(&spec, false).unwrap();
    assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
    assert!(has_line(&runtime.drain_log(), "[Code Error] ZeroDivisionError"));
    assert!(runtime.variables().is_empty());
}

#[test]
fn faulting_during_action_still_dispatches_event() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial().during("x = 1 / 0"))
        .state(StateSpec::new("B").entry("arrived = True"))
        .transition(TransitionSpec::new("A", "B").on("go"));
    let mut runtime = Runtime::new(&spec, false).unwrap();

    let report = runtime.step(Some("go")).unwrap();
    assert_eq!(report.state, "B");
    assert!(has_line(&report.log, "[Code Error] ZeroDivisionError"));
    assert!(has_line(&report.log, "Entering state: B"));
    assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
    assert_eq!(runtime.variables()["arrived"], Value::Bool(true));
    assert_eq!(runtime.history().transitions().len(), 1);
}

#[test]
fn deeply_nested_script_is_blocked_not_fatal() {
    let depth = 10_000;
    let script = format!("x = {}1{}", "(".repeat(depth), ")".repeat(depth));
    let spec = MachineSpec::new().state(StateSpec::new("A").initial().entry(script));
    let mut runtime = Runtime::new(&spec, true).unwrap();

    let log = runtime.drain_log();
    assert!(has_line(&log, "[Safety Check Failed]"));
    assert!(runtime.variables().get("x").is_none());
    assert_eq!(runtime.lifecycle(), Lifecycle::Ready);
}

#[test]
fn forbidden_call_blocks_whole_script() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial().entry("x = 1; open('f'); y = 2"));
    let mut runtime = Runtime::new(&spec, false).unwrap();

    let log = runtime.drain_log();
    assert!(runtime.variables().get("x").is_none());
    assert!(runtime.variables().get("y").is_none());
    assert!(has_line(&log, "[Safety Check Failed]"));
    assert!(has_line(&log, "[Action Blocked by Safety Check]"));
    assert!(!has_line(&log, "[Code Error]"));
}

#[test]
fn blocked_condition_is_false() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial())
        .state(StateSpec::new("B"))
        .transition(
            TransitionSpec::new("A", "B")
                .on("go")
                .when("x.__class__ is not None"),
        );
    let mut runtime = Runtime::new(&spec, false).unwrap();
    let report = runtime.step(Some("go")).unwrap();

    assert_eq!(report.state, "A");
    assert!(has_line(&report.log, "[Condition Blocked by Safety Check]"));
}

#[test]
fn failing_condition_is_not_taken() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial())
        .state(StateSpec::new("B"))
        .state(StateSpec::new("C"))
        .transition(TransitionSpec::new("A", "B").on("go").when("undefined > 1"))
        .transition(TransitionSpec::new("A", "C").on("go"));
    let mut runtime = Runtime::new(&spec, true).unwrap();

    let report = runtime.step(Some("go")).unwrap();
    assert_eq!(report.state, "C");
    assert!(has_line(&report.log, "[Code Error] NameError"));
    assert!(!runtime.is_halted());
}

#[test]
fn transition_action_runs_between_exit_and_entry() {
    let spec = MachineSpec::new()
        .state(StateSpec::new("A").initial().exit("trace = ['exit A']"))
        .state(StateSpec::new("B").entry("trace = trace + ['enter B']"))
        .transition(
            TransitionSpec::new("A", "B")
                .on("go")
                .action("trace = trace + ['action']"),
        );
    let mut runtime = Runtime::new(&spec, false).unwrap();
    runtime.step(Some("go")).unwrap();

    assert_eq!(
        runtime.variables()["trace"],
        Value::List(vec![
            Value::from("exit A"),
            Value::from("action"),
            Value::from("enter B"),
        ])
    );
}

#[test]
fn superstate_reports_composite_name() {
    let mut runtime = Runtime::new(&processing_spec(), false).unwrap();
    let report = runtime.step(Some("start_processing")).unwrap();

    assert_eq!(report.state, "Processing (SubIdle)");
    assert_eq!(runtime.current_leaf_state_name(), "SubIdle");
    assert!(has_line(&report.log, "  [SUB] [Script Output] Sub-FSM Idle Entered"));
    assert!(has_line(
        &report.log,
        "[Script Output] Parent Processing Superstate Entered"
    ));

    let sub = runtime.active_sub_machine().unwrap();
    assert_eq!(sub.variables()["sub_var"], Value::Int(10));
    assert!(runtime.variables().get("sub_var").is_none());
}

#[test]
fn sub_machine_completes_and_parent_leaves() {
    let mut runtime = Runtime::new(&processing_spec(), false).unwrap();
    runtime.step(Some("start_processing")).unwrap();

    let sub = runtime.active_sub_machine_mut().unwrap();
    sub.step(Some("start_sub_work")).unwrap();
    assert_eq!(sub.variables()["sub_var"], Value::Int(15));
    sub.step(None).unwrap();
    sub.step(None).unwrap();
    sub.step(None).unwrap();
    let report = sub.step(Some("finish_sub_work")).unwrap();
    assert_eq!(report.state, "SubDone");

    // The parent has not yet observed completion.
    let report = runtime.step(Some("auto_finish")).unwrap();
    assert!(has_line(
        &report.log,
        "Sub-machine in 'Processing' reached final state: 'SubDone'."
    ));
    assert_eq!(
        runtime.variables().get("Processing_sub_completed"),
        Some(&Value::Bool(true))
    );
    assert_eq!(report.state, "Done");
    assert!(has_line(
        &report.log,
        "Superstate 'Processing' exited. Terminating its sub-machine."
    ));
    assert!(runtime.active_sub_machine().is_none());
}

#[test]
fn completion_flag_is_visible_on_next_step() {
    let mut runtime = Runtime::new(&processing_spec(), false).unwrap();
    runtime.step(Some("start_processing")).unwrap();

    let report = runtime.step(Some("auto_finish")).unwrap();
    assert_eq!(report.state, "Processing (SubIdle)");
    assert!(has_line(&report.log, "Event 'auto_finish' not allowed"));

    runtime
        .active_sub_machine_mut()
        .unwrap()
        .step(Some("start_sub_work"))
        .unwrap();
    for _ in 0..3 {
        runtime.step(None).unwrap();
    }
    runtime
        .active_sub_machine_mut()
        .unwrap()
        .step(Some("finish_sub_work"))
        .unwrap();

    runtime.step(None).unwrap();
    assert_eq!(
        runtime.variables().get("Processing_sub_completed"),
        Some(&Value::Bool(true))
    );
    let report = runtime.step(Some("auto_finish")).unwrap();
    assert_eq!(report.state, "Done");
}

#[test]
fn exiting_superstate_drains_sub_log_in_same_step() {
    let sub = MachineSpec::new().state(StateSpec::new("Inner").initial());
    let spec = MachineSpec::new()
        .state(StateSpec::new("Outer").initial().superstate(sub))
        .state(StateSpec::new("After"))
        .transition(TransitionSpec::new("Outer", "After").on("leave"));
    let mut runtime = Runtime::new(&spec, false).unwrap();
    runtime.drain_log();

    // A direct reset of the child leaves its lines buffered in the child.
    runtime.active_sub_machine_mut().unwrap().reset().unwrap();

    let report = runtime.step(Some("leave")).unwrap();
    let position = |needle: &str| report.log.iter().position(|l| l == needle).unwrap();
    let reset_at = position("  [SUB] FSM Reset. Current state: Inner");
    let internal_at = position("  [SUB] --- Step. State: Inner. Event: Internal ---");
    let exit_at = position("Superstate 'Outer' exited. Terminating its sub-machine.");

    assert!(reset_at < internal_at);
    assert!(internal_at < exit_at);
    assert_eq!(report.state, "After");
}

#[test]
fn possible_events_cover_every_active_level() {
    let mut runtime = Runtime::new(&processing_spec(), false).unwrap();
    assert_eq!(runtime.possible_events(), vec!["start_processing"]);

    runtime.step(Some("start_processing")).unwrap();
    assert_eq!(
        runtime.possible_events(),
        vec!["auto_finish", "start_sub_work"]
    );
}

#[test]
fn reset_tears_down_sub_machine() {
    let mut runtime = Runtime::new(&processing_spec(), false).unwrap();
    runtime.step(Some("start_processing")).unwrap();
    runtime.step(None).unwrap();
    runtime.drain_log();

    runtime.reset().unwrap();
    let log = runtime.drain_log();
    assert!(has_line(&log, "Resetting active sub-machine..."));
    assert!(has_line(&log, "  [SUB] --- FSM Resetting ---"));
    assert!(has_line(&log, "  [SUB] FSM Reset. Current state: SubIdle"));
    assert_eq!(runtime.current_state_name(), "Idle");
    assert!(runtime.active_sub_machine().is_none());
    assert_eq!(runtime.variables_snapshot().len(), 1);
    assert_eq!(runtime.variables()["parent_var"], Value::Int(1));
}

#[test]
fn halted_sub_machine_halts_parent() {
    let sub = MachineSpec::new()
        .state(StateSpec::new("Start").initial())
        .state(StateSpec::new("Broken").during("y = [][0]"))
        .transition(TransitionSpec::new("Start", "Broken").on("break"));
    let spec = MachineSpec::new().state(StateSpec::new("Outer").initial().superstate(sub));
    let mut runtime = Runtime::new(&spec, true).unwrap();

    runtime
        .active_sub_machine_mut()
        .unwrap()
        .step(Some("break"))
        .unwrap();

    let err = runtime.step(None).unwrap_err();
    assert!(matches!(err, FsmError::Halted(_)));
    assert!(runtime.is_halted());
    let log = runtime.drain_log();
    assert!(has_line(&log, "[Code Error] IndexError"));
    assert!(has_line(
        &log,
        "Propagation: Parent HALTED due to sub-machine error in 'Outer'."
    ));

    runtime.reset().unwrap();
    assert_eq!(runtime.current_state_name(), "Outer (Start)");
    assert!(!runtime.is_halted());
}

#[test]
fn log_prefix_applies_to_every_level() {
    let options = RuntimeOptions::new().log_prefix("[main] ");
    let mut runtime = Runtime::with_options(&processing_spec(), options).unwrap();
    runtime.step(Some("start_processing")).unwrap();
    let report = runtime.step(None).unwrap();

    assert!(report.log.iter().all(|line| line.starts_with("[main] ")));
    assert!(has_line(&report.log, "[main]   [SUB] --- Step. State: SubIdle"));
}

#[test]
fn diagram_json_builds_a_runtime() {
    let json = r#"{
        "states": [
            {"name": "Off", "is_initial": true, "entry_action": "level = 0"},
            {"name": "On", "during_action": "level += 1"}
        ],
        "transitions": [
            {"source": "Off", "target": "On", "event": "toggle"},
            {"source": "On", "target": "Off", "event": "toggle", "condition": "level >= 2"}
        ]
    }"#;
    let spec = MachineSpec::from_json(json).unwrap();
    let mut runtime = Runtime::new(&spec, false).unwrap();

    runtime.step(Some("toggle")).unwrap();
    runtime.step(Some("toggle")).unwrap();
    assert_eq!(runtime.current_state_name(), "On");
    let report = runtime.step(Some("toggle")).unwrap();
    assert_eq!(report.state, "Off");
    assert_eq!(runtime.history().path(), vec!["Off", "On", "Off"]);
}
