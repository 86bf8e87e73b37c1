//! Hierarchical Simulation
//!
//! This example drives a machine with a superstate whose sub-machine is
//! stepped alongside its parent.
//!
//! Key concepts:
//! - Superstates start a nested runtime on entry
//! - The sub-machine's during actions run on every parent step
//! - Completion reaches the parent through `<Superstate>_sub_completed`
//! - Unsafe scripts are blocked before they run
//! - Halting on action errors
//!
//! Run with: cargo run --example hierarchical_simulation

use bsm_engine::{FsmError, MachineSpec, Runtime, StateSpec, TransitionSpec};

const DIAGRAM: &str = r#"{
    "states": [
        {"name": "Idle", "is_initial": true,
         "entry_action": "print('Main: Idle Entered'); idle_counter = 0; Processing_sub_completed = False"},
        {"name": "Processing", "is_superstate": true,
         "sub_fsm_data": {
             "states": [
                 {"name": "SubIdle", "is_initial": true,
                  "entry_action": "print('Sub: SubIdle Entered'); sub_var = 10"},
                 {"name": "SubActive",
                  "during_action": "sub_var = sub_var + 1; print('Sub: SubActive during, sub_var is', sub_var)"},
                 {"name": "SubDone", "is_final": true,
                  "entry_action": "print('Sub: SubDone Entered (final)')"}
             ],
             "transitions": [
                 {"source": "SubIdle", "target": "SubActive", "event": "start_sub_work"},
                 {"source": "SubActive", "target": "SubDone", "event": "finish_sub_work",
                  "condition": "sub_var > 11"}
             ]
         },
         "entry_action": "print('Main: Processing Superstate Entered')",
         "during_action": "print('Main: Processing Superstate During'); idle_counter = idle_counter + 1",
         "exit_action": "print('Main: Processing Superstate Exited')"},
        {"name": "Done", "is_final": true, "entry_action": "print('Main: Done Entered')"}
    ],
    "transitions": [
        {"source": "Idle", "target": "Processing", "event": "start_processing"},
        {"source": "Processing", "target": "Done", "event": "auto_finish",
         "condition": "Processing_sub_completed == True"}
    ]
}"#;

fn print_status(runtime: &Runtime, title: &str, log: Vec<String>) {
    println!("\n--- {title} ---");
    println!("Current State: {}", runtime.current_state_name());
    println!("Leaf State: {}", runtime.current_leaf_state_name());
    println!("Main Vars: {}", bsm_engine::core::format_scope(runtime.variables()));
    if let Some(sub) = runtime.active_sub_machine() {
        println!("Sub Vars: {}", bsm_engine::core::format_scope(sub.variables()));
    }
    if !log.is_empty() {
        println!("Log:");
        for line in log {
            println!("  {line}");
        }
    }
    println!("Possible events: {:?}", runtime.possible_events());
}

fn step_sub(runtime: &mut Runtime, event: &str) -> Result<(), FsmError> {
    if let Some(sub) = runtime.active_sub_machine_mut() {
        println!("\n>>> Trigger '{event}' on the sub-machine <<<");
        let report = sub.step(Some(event))?;
        println!("Sub-machine now in: {}", report.state);
        for line in report.log {
            println!("  {line}");
        }
    }
    Ok(())
}

fn main() -> Result<(), FsmError> {
    println!("=== Hierarchical Simulation ===");

    let spec = MachineSpec::from_json(DIAGRAM)?;
    let mut runtime = Runtime::new(&spec, false)?;
    let log = runtime.drain_log();
    print_status(&runtime, "INITIAL STATE", log);

    let report = runtime.step(Some("start_processing"))?;
    print_status(&runtime, "AFTER 'start_processing'", report.log);

    step_sub(&mut runtime, "start_sub_work")?;

    for i in 1..=2 {
        let report = runtime.step(None)?;
        print_status(&runtime, &format!("AFTER internal step {i}"), report.log);
    }

    step_sub(&mut runtime, "finish_sub_work")?;

    let report = runtime.step(Some("auto_finish"))?;
    print_status(&runtime, "AFTER 'auto_finish'", report.log);
    println!("Path: {:?}", runtime.history().path());

    println!("\n=== Unsafe Code (blocked) ===");
    let unsafe_spec = MachineSpec::new()
        .state(
            StateSpec::new("UnsafeState")
                .initial()
                .entry("__import__('os').system('echo THIS_SHOULD_BE_BLOCKED')"),
        )
        .transition(TransitionSpec::new("UnsafeState", "UnsafeState").on("again"));
    let mut unsafe_runtime = Runtime::new(&unsafe_spec, false)?;
    let log = unsafe_runtime.drain_log();
    print_status(&unsafe_runtime, "Unsafe script at start", log);

    println!("\n=== Action Error (halting) ===");
    let halting_spec = MachineSpec::new()
        .state(StateSpec::new("HaltErrState").initial().entry("x = 1 / 0"));
    match Runtime::new(&halting_spec, true) {
        Ok(_) => println!("Unexpected: runtime started"),
        Err(err) => {
            println!("FSM Error (expected): {err}");
            if let Some(mut halted) = err.into_runtime() {
                let log = halted.drain_log();
                print_status(&halted, "Halted runtime", log);
                let report = halted.step(Some("anything"))?;
                println!("Step while halted: {:?}", report.log);
            }
        }
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
