// tests/concurrency.rs

mod common;
use crate::common::{ProcessBuilder, init_tracing};

use fleetdag::engine::RunOutcome;

#[test]
fn deploy_limited_to_two_across_five_nodes() {
    init_tracing();
    let mut builder = ProcessBuilder::new().limit("deploy", 2).hold_polls(1);
    for i in 0..5 {
        let node = format!("node-{i}");
        builder = builder.node(&node).tasks(&node, &["deploy"]);
    }
    let (mut process, recorder) = builder.build();

    let first = process.process_all_nodes().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(process.current_concurrency("deploy"), 2);

    assert_eq!(process.run().unwrap(), RunOutcome::Succeeded);
    assert_eq!(recorder.dispatched().len(), 5);
    assert_eq!(recorder.peak_running("deploy"), 2);
    assert_eq!(process.current_concurrency("deploy"), 0);
}

#[test]
fn limit_of_one_serialises_same_named_tasks() {
    let (mut process, recorder) = ProcessBuilder::new()
        .limit("restart", 1)
        .hold_polls(2)
        .node("a")
        .tasks("a", &["restart", "check"])
        .node("b")
        .tasks("b", &["restart"])
        .build();

    assert_eq!(process.run().unwrap(), RunOutcome::Succeeded);
    assert_eq!(recorder.peak_running("restart"), 1);
    assert!(recorder.position("a/restart") < recorder.position("b/restart"));
}

#[test]
fn other_names_are_not_held_back() {
    let (mut process, recorder) = ProcessBuilder::new()
        .limit("deploy", 1)
        .hold_polls(3)
        .node("a")
        .tasks("a", &["deploy"])
        .node("b")
        .tasks("b", &["deploy", "lint"])
        .build();

    process.process_all_nodes().unwrap();
    assert_eq!(recorder.dispatched(), vec!["a/deploy", "b/lint"]);
}

#[test]
fn failed_task_releases_its_slot() {
    let (mut process, recorder) = ProcessBuilder::new()
        .limit("deploy", 1)
        .node("a")
        .tasks("a", &["deploy"])
        .node("b")
        .tasks("b", &["deploy"])
        .fail("a/deploy")
        .build();

    let outcome = process.run().unwrap();
    assert!(!outcome.is_success());
    assert!(recorder.was_dispatched("b/deploy"));
    assert_eq!(process.current_concurrency("deploy"), 0);
}
