// tests/node.rs

mod common;
use crate::common::{init_tracing, task_id};

use fleetdag::dag::{Graph, TaskArena, TaskId};
use fleetdag::engine::{Node, Process};
use fleetdag::errors::{FleetError, Result};
use fleetdag::exec::{NodeContext, NodeExecutor};
use fleetdag::types::{NodeStatus, TaskStatus};

/// Starts whatever task it was built with, ignoring the one dispatched.
struct Misroute(TaskId);

impl NodeExecutor for Misroute {
    fn dispatch(&mut self, node: &mut NodeContext<'_>, _task: TaskId) -> Result<()> {
        node.begin(self.0)
    }

    fn poll(&mut self, _node: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Completes nothing; records what it saw.
#[derive(Default)]
struct Idle;

impl NodeExecutor for Idle {
    fn dispatch(&mut self, node: &mut NodeContext<'_>, task: TaskId) -> Result<()> {
        node.begin(task)
    }

    fn poll(&mut self, _node: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }
}

#[test]
fn node_without_executor_is_not_implemented() {
    init_tracing();
    let mut process = Process::new();
    let n = process.add_node(Node::new("bare")).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    match process.run_task(a) {
        Err(FleetError::NotImplemented(msg)) => assert!(msg.contains("run")),
        other => panic!("expected NotImplemented, got {other:?}"),
    }
    match process.run() {
        Err(FleetError::NotImplemented(msg)) => assert!(msg.contains("poll")),
        other => panic!("expected NotImplemented, got {other:?}"),
    }
}

#[test]
fn begin_rejects_tasks_of_other_nodes() {
    let mut process = Process::new();
    let other = process.add_node(Node::new("other")).unwrap();
    let foreign = process.add_new_task(other, "x", None).unwrap();

    let n = process.add_node(Node::new("n").with_executor(Misroute(foreign))).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    match process.run_task(a) {
        Err(FleetError::InvalidArgument(msg)) => assert!(msg.contains("not found")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert!(process.node(n).unwrap().online());
    assert_eq!(process.node(n).unwrap().current_task(), None);
}

#[test]
fn dispatch_marks_node_busy_with_current_task() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n").with_executor(Idle)).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    process.run_task(a).unwrap();

    let node = process.node(n).unwrap();
    assert!(node.busy());
    assert_eq!(node.current_task(), Some(a));
    assert!(process.task(a).unwrap().running());

    // A busy node is polled but gets nothing new.
    process.add_new_task(n, "b", None).unwrap();
    assert_eq!(process.process_node(n).unwrap(), None);
}

#[test]
fn set_status_validates_text() {
    let mut node = Node::new("n");
    match node.set_status_str("sleepy") {
        Err(FleetError::InvalidStatus(msg)) => assert!(msg.contains("sleepy")),
        other => panic!("expected InvalidStatus, got {other:?}"),
    }
    assert!(node.online());

    node.set_status_str("offline").unwrap();
    assert!(node.offline());
    assert_eq!(node.status(), NodeStatus::Offline);
}

#[test]
fn set_task_requires_membership() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    let m = process.add_node(Node::new("m")).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();
    let b = process.add_new_task(m, "b", None).unwrap();

    let tasks = process.tasks().clone();
    let node = process.node_mut(n).unwrap();
    node.set_task(&tasks, Some(a)).unwrap();
    assert_eq!(node.current_task(), Some(a));

    match node.set_task(&tasks, Some(b)) {
        Err(FleetError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    node.set_task(&tasks, None).unwrap();
    assert_eq!(node.current_task(), None);
}

#[test]
fn node_status_overrides_task_aggregates() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    process.add_new_task(n, "a", None).unwrap();

    {
        let node = process.node(n).unwrap();
        assert!(!node.finished(process.tasks()));
        assert!(!node.failed(process.tasks()));
        assert!(!node.successful(process.tasks()));
    }

    process.node_mut(n).unwrap().set_status(NodeStatus::Failed);
    let node = process.node(n).unwrap();
    assert!(node.finished(process.tasks()));
    assert!(node.failed(process.tasks()));
    assert!(!node.successful(process.tasks()));
}

#[test]
fn task_aggregates_make_node_successful() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    process.set_task_status(a, TaskStatus::Successful).unwrap();
    let node = process.node(n).unwrap();
    assert!(node.successful(process.tasks()));
    assert!(node.finished(process.tasks()));
    assert_eq!(node.status(), NodeStatus::Online);
}

#[test]
fn moving_a_task_between_nodes() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    let m = process.add_node(Node::new("m")).unwrap();
    process.add_new_task(n, "a", None).unwrap();
    let a = task_id(&process, "n", "a");

    process.set_task_node(a, m).unwrap();
    assert_eq!(process.task(a).unwrap().node(), m);
    assert_eq!(process.get_task(n, "a"), None);
    assert_eq!(process.get_task(m, "a"), Some(a));
    assert_eq!(process.task_label(a), "m/a");

    let missing = process.nodes().len();
    let bogus = {
        let mut other = Process::new();
        for i in 0..=missing {
            other.add_node(Node::new(format!("x{i}"))).unwrap();
        }
        other.find_node(&format!("x{missing}")).unwrap()
    };
    match process.set_task_node(a, bogus) {
        Err(FleetError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn display_forms() {
    let plain = Node::new("web");
    assert_eq!(plain.to_string(), "Node[web]");

    let with_id = Node::new("web").with_id("10.0.0.7");
    assert_eq!(with_id.to_string(), "Node[10.0.0.7/web]");

    assert_eq!(Process::with_id("rollout").to_string(), "Process[rollout]");
}

#[test]
fn refused_dispatch_restores_the_task_status() {
    let mut process = Process::new();
    let other = process.add_node(Node::new("other")).unwrap();
    let foreign = process.add_new_task(other, "x", None).unwrap();
    let n = process.add_node(Node::new("n").with_executor(Misroute(foreign))).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    assert!(process.run_task(a).is_err());
    assert!(process.task(a).unwrap().pending());
    assert!(process.task_ready(a).unwrap());
}

#[test]
fn add_node_rejects_a_graph_of_another_arena() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    // Same index as `a`, different task.
    let mut arena = TaskArena::new();
    let mut graph = Graph::new(n);
    graph.add_new_task(&mut arena, "ghost", None).unwrap();

    match process.add_node(Node::new("m").with_graph(graph)) {
        Err(FleetError::InvalidArgument(msg)) => assert!(msg.contains("'ghost'")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert_eq!(process.nodes().len(), 1);
    assert_eq!(process.task(a).unwrap().node(), n);
}

#[test]
fn graph_held_by_another_node_is_rejected() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n")).unwrap();
    let m = process.add_node(Node::new("m")).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();

    let copy = process.node(n).unwrap().graph().clone();
    match process.set_node_graph(m, copy.clone()) {
        Err(FleetError::InvalidArgument(msg)) => assert!(msg.contains("still held")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert!(process.add_node(Node::new("k").with_graph(copy)).is_err());
    assert_eq!(process.task(a).unwrap().node(), n);
}

#[test]
fn busy_node_keeps_its_graph() {
    let mut process = Process::new();
    let n = process.add_node(Node::new("n").with_executor(Idle)).unwrap();
    let a = process.add_new_task(n, "a", None).unwrap();
    process.run_task(a).unwrap();

    let empty = Graph::new(n);
    assert!(process.set_node_graph(n, empty).is_err());
    assert_eq!(process.get_task(n, "a"), Some(a));
}

