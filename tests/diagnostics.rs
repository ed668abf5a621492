// tests/diagnostics.rs

mod common;
use crate::common::{ProcessBuilder, task_id};

use fleetdag::dag::NodeId;
use fleetdag::diagnostics::{self, status_colour};
use fleetdag::engine::Process;
use fleetdag::errors::FleetError;
use fleetdag::types::TaskStatus;

#[test]
fn dot_output_lists_tasks_edges_and_colours() {
    let (mut process, _) = ProcessBuilder::new()
        .node("db")
        .tasks("db", &["migrate"])
        .node("web")
        .tasks("web", &["deploy", "lint"])
        .after("web", "deploy", "db", "migrate")
        .build();

    let dot = diagnostics::to_dot(&process);
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("db/migrate"));
    assert!(dot.contains("web/deploy"));
    assert!(dot.contains("->"));
    assert!(dot.contains("fillcolor=yellow"));
    assert!(dot.contains("fillcolor=white"));

    let migrate = task_id(&process, "db", "migrate");
    process.set_task_status(migrate, TaskStatus::Failed).unwrap();
    let dot = diagnostics::to_dot(&process);
    assert!(dot.contains("fillcolor=red"));
    assert!(dot.contains("fillcolor=orange"));
}

#[test]
fn colours_follow_status() {
    let (mut process, _) = ProcessBuilder::new()
        .node("n")
        .chain("n", &["a", "b"])
        .tasks("n", &["c", "d"])
        .build();
    let a = task_id(&process, "n", "a");
    let b = task_id(&process, "n", "b");
    let c = task_id(&process, "n", "c");
    let d = task_id(&process, "n", "d");

    assert_eq!(status_colour(&process, a), "yellow");
    assert_eq!(status_colour(&process, b), "white");

    process.set_task_status(a, TaskStatus::Running).unwrap();
    process.set_task_status(c, TaskStatus::Skipped).unwrap();
    process.set_task_status(d, TaskStatus::Successful).unwrap();
    assert_eq!(status_colour(&process, a), "lightblue");
    assert_eq!(status_colour(&process, c), "purple");
    assert_eq!(status_colour(&process, d), "green");
}

#[test]
fn topology_labels_and_summary() {
    let (mut process, _) = ProcessBuilder::new()
        .node("n")
        .chain("n", &["a", "b", "c"])
        .build();

    assert_eq!(
        diagnostics::topology_labels(&process).unwrap(),
        vec!["n/a", "n/b", "n/c"]
    );

    let a = task_id(&process, "n", "a");
    process.set_task_status(a, TaskStatus::Successful).unwrap();
    assert_eq!(
        diagnostics::summary(&process),
        "Process[test]: 3 tasks, 1 successful, 0 failed, 0 running, 2 pending"
    );
}

#[test]
fn node_dot_keeps_only_that_node() {
    let (process, _) = ProcessBuilder::new()
        .node("db")
        .chain("db", &["backup", "migrate"])
        .node("web")
        .tasks("web", &["deploy"])
        .after("web", "deploy", "db", "migrate")
        .build();
    let db = process.find_node("db").unwrap();

    let dot = diagnostics::node_to_dot(&process, db).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("db/backup"));
    assert!(dot.contains("db/migrate"));
    assert!(!dot.contains("web/deploy"));
    assert_eq!(dot.matches("->").count(), 1);

    assert_eq!(diagnostics::to_dot(&process).matches("->").count(), 2);
}

#[test]
fn node_dot_of_unknown_node_is_invalid_argument() {
    let (process, _) = ProcessBuilder::new().node("n").build();
    let mut other = Process::new();
    other.add_node(fleetdag::engine::Node::new("x")).unwrap();
    let second: NodeId = other.add_node(fleetdag::engine::Node::new("y")).unwrap();

    match diagnostics::node_to_dot(&process, second) {
        Err(FleetError::InvalidArgument(msg)) => assert!(msg.contains("no node")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

