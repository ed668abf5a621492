// tests/topology.rs

mod common;
use crate::common::{ProcessBuilder, init_tracing, task_id};

use fleetdag::errors::FleetError;

#[test]
fn three_task_ring_is_a_loop() {
    init_tracing();
    let (mut process, recorder) = ProcessBuilder::new()
        .node("n")
        .tasks("n", &["a", "b", "c"])
        .build();
    let n = process.find_node("n").unwrap();
    process.add_dependency(n, "a", "b").unwrap();
    process.add_dependency(n, "b", "c").unwrap();
    process.add_dependency(n, "c", "a").unwrap();

    match process.run() {
        Err(FleetError::LoopDetected { path }) => {
            assert_eq!(path, vec!["n/a", "n/b", "n/c", "n/a"]);
        }
        other => panic!("expected LoopDetected, got {other:?}"),
    }
    assert!(recorder.dispatched().is_empty());
}

#[test]
fn same_tasks_without_the_closing_edge_sort() {
    let (mut process, _) = ProcessBuilder::new()
        .node("n")
        .tasks("n", &["a", "b", "c"])
        .build();
    let n = process.find_node("n").unwrap();
    process.add_dependency(n, "a", "b").unwrap();
    process.add_dependency(n, "b", "c").unwrap();
    process.add_dependency(n, "c", "a").unwrap();

    let a = task_id(&process, "n", "a");
    let c = task_id(&process, "n", "c");
    process.remove_dependency(a, c).unwrap();

    let order = process.topology_sort().unwrap();
    let labels: Vec<String> = order.iter().map(|t| process.task_label(*t)).collect();
    assert_eq!(labels, vec!["n/a", "n/b", "n/c"]);
}

#[test]
fn loop_across_nodes_is_detected() {
    let (process, _) = ProcessBuilder::new()
        .node("x")
        .tasks("x", &["one"])
        .node("y")
        .tasks("y", &["two"])
        .after("y", "two", "x", "one")
        .after("x", "one", "y", "two")
        .build();

    match process.topology_sort() {
        Err(FleetError::LoopDetected { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"x/one".to_string()));
            assert!(path.contains(&"y/two".to_string()));
        }
        other => panic!("expected LoopDetected, got {other:?}"),
    }
}

#[test]
fn ordering_covers_every_task_with_dependencies_first() {
    let (process, _) = ProcessBuilder::new()
        .node("app")
        .chain("app", &["build", "test", "ship"])
        .node("db")
        .chain("db", &["backup", "migrate"])
        .node("cache")
        .tasks("cache", &["flush"])
        .after("app", "ship", "db", "migrate")
        .after("cache", "flush", "app", "ship")
        .build();

    let order = process.topology_sort().unwrap();
    assert_eq!(order.len(), process.tasks_total_count());

    let position = |node: &str, task: &str| {
        let id = task_id(&process, node, task);
        order.iter().position(|t| *t == id).unwrap()
    };
    assert!(position("app", "build") < position("app", "test"));
    assert!(position("app", "test") < position("app", "ship"));
    assert!(position("db", "backup") < position("db", "migrate"));
    assert!(position("db", "migrate") < position("app", "ship"));
    assert!(position("app", "ship") < position("cache", "flush"));
}

#[test]
fn loop_error_message_shows_the_path() {
    let (mut process, _) = ProcessBuilder::new()
        .node("n")
        .tasks("n", &["a", "b"])
        .build();
    let n = process.find_node("n").unwrap();
    process.add_dependency(n, "a", "b").unwrap();
    process.add_dependency(n, "b", "a").unwrap();

    let err = process.topology_sort().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Loop detected in task graph: n/a -> n/b -> n/a"
    );
}
