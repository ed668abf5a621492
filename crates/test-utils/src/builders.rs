#![allow(dead_code)]

use fleetdag::dag::TaskId;
use fleetdag::engine::{Node, Process};
use fleetdag::types::TaskStatus;

use crate::fake_executor::FakeRecorder;

/// Builder for small fleets driven by [`FakeExecutor`](crate::FakeExecutor)s.
///
/// Every node gets an executor sharing one [`FakeRecorder`]. Panics on any
/// construction error, which is what a test wants.
pub struct ProcessBuilder {
    process: Process,
    recorder: FakeRecorder,
}

impl ProcessBuilder {
    pub fn new() -> Self {
        Self {
            process: Process::with_id("test"),
            recorder: FakeRecorder::new(),
        }
    }

    pub fn node(mut self, name: &str) -> Self {
        let node = Node::new(name).with_executor(self.recorder.executor());
        self.process.add_node(node).expect("add_node failed");
        self
    }

    pub fn critical_node(mut self, name: &str) -> Self {
        let node = Node::new(name)
            .with_critical(true)
            .with_executor(self.recorder.executor());
        self.process.add_node(node).expect("add_node failed");
        self
    }

    /// Add tasks to an existing node, in order.
    pub fn tasks(mut self, node: &str, names: &[&str]) -> Self {
        let id = self.node_id(node);
        for name in names {
            self.process
                .add_new_task(id, *name, None)
                .expect("add_new_task failed");
        }
        self
    }

    /// Chain the tasks of a node one after the other.
    pub fn chain(mut self, node: &str, names: &[&str]) -> Self {
        self = self.tasks(node, names);
        let id = self.node_id(node);
        for pair in names.windows(2) {
            self.process
                .add_dependency(id, pair[0], pair[1])
                .expect("add_dependency failed");
        }
        self
    }

    /// Make `node/task` wait for `dep_node/dep_task`.
    pub fn after(mut self, node: &str, task: &str, dep_node: &str, dep_task: &str) -> Self {
        let task = self.task_id(node, task);
        let dep = self.task_id(dep_node, dep_task);
        self.process.depends(task, dep).expect("depends failed");
        self
    }

    pub fn limit(mut self, name: &str, maximum: usize) -> Self {
        self.process.set_maximum_concurrency(name, maximum);
        self
    }

    /// Script `task` (bare name or `node/task`) to finish with `status`.
    pub fn outcome(self, task: &str, status: TaskStatus) -> Self {
        self.recorder.set_outcome(task, status);
        self
    }

    pub fn fail(self, task: &str) -> Self {
        self.outcome(task, TaskStatus::Failed)
    }

    pub fn hold_polls(self, polls: usize) -> Self {
        self.recorder.set_hold_polls(polls);
        self
    }

    pub fn build(self) -> (Process, FakeRecorder) {
        (self.process, self.recorder)
    }

    fn node_id(&self, node: &str) -> fleetdag::dag::NodeId {
        self.process
            .find_node(node)
            .unwrap_or_else(|| panic!("no node named {node}"))
    }

    fn task_id(&self, node: &str, task: &str) -> TaskId {
        let id = self.node_id(node);
        self.process
            .get_task(id, task)
            .unwrap_or_else(|| panic!("no task {node}/{task}"))
    }
}

impl Default for ProcessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle of `node/task` in `process`; panics if missing.
pub fn task_id(process: &Process, node: &str, task: &str) -> TaskId {
    let id = process
        .find_node(node)
        .unwrap_or_else(|| panic!("no node named {node}"));
    process
        .get_task(id, task)
        .unwrap_or_else(|| panic!("no task {node}/{task}"))
}
