// src/engine/process.rs

//! The top-level orchestrator over a fleet of nodes.
//!
//! A [`Process`] owns every node, the arena holding every task of every
//! node, and the concurrency registry shared by same-named tasks. One run is:
//!
//! 1. pre-flight topological sort over all tasks (a loop aborts the run);
//! 2. ticks: poll each node, then dispatch the first ready task of each
//!    online node;
//! 3. a termination check before every tick.
//!
//! [`Process::run`] is a tight loop. Drivers that need pacing or external
//! interruption call [`Process::check_termination`] and
//! [`Process::process_all_nodes`] themselves.

use std::fmt;

use tracing::{debug, info, warn};

use crate::dag::{
    ConcurrencyRegistry, Graph, NodeId, Task, TaskArena, TaskData, TaskId, TaskRef, topology,
};
use crate::engine::node::Node;
use crate::engine::outcome::{FailureReason, RunOutcome};
use crate::errors::{FleetError, Result};
use crate::types::TaskStatus;

#[derive(Debug, Default)]
pub struct Process {
    id: Option<String>,
    nodes: Vec<Node>,
    tasks: TaskArena,
    concurrency: ConcurrencyRegistry,
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "Process[{id}]"),
            None => write!(f, "Process[]"),
        }
    }
}

impl Process {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    // ---- nodes ----------------------------------------------------------

    /// Append a node; nodes are processed in the order they were added.
    ///
    /// Tasks already in the node's graph must be tasks of this process that
    /// no other node holds; they are re-parented to the new node.
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.check_graph(node.graph(), None)?;
        node.attach(id);
        self.adopt_tasks(node.task_ids().collect(), id)?;
        debug!(process = %self, node = %node, index = %id, "node added");
        self.nodes.push(node);
        Ok(id)
    }

    /// Give `node` a new graph, re-parenting its tasks to `node`.
    ///
    /// Returns the previous graph. Its tasks stay in the process but belong
    /// to no graph until they are added to one again.
    pub fn set_node_graph(&mut self, node: NodeId, graph: Graph) -> Result<Graph> {
        let target = self.ensure_node(node)?;
        if target.busy() {
            return Err(FleetError::InvalidArgument(format!(
                "cannot replace the graph of busy node {target}"
            )));
        }
        self.check_graph(&graph, Some(node))?;

        let adopted: Vec<TaskId> = graph.task_ids().collect();
        let previous = self.nodes[node.index()].set_graph(graph);
        self.adopt_tasks(adopted, node)?;
        debug!(process = %self, node = %self.nodes[node.index()], "graph replaced");
        Ok(previous)
    }

    /// Reject graphs holding handles of another arena or tasks still held
    /// by a node other than `owner`.
    fn check_graph(&self, graph: &Graph, owner: Option<NodeId>) -> Result<()> {
        for (name, task) in graph.task_names().zip(graph.task_ids()) {
            let Some(t) = self.tasks.get(task).filter(|t| t.name() == name) else {
                return Err(FleetError::InvalidArgument(format!(
                    "graph task '{name}' ({task}) is not a task of {self}"
                )));
            };
            let holder = self
                .nodes
                .get(t.node().index())
                .filter(|n| Some(n.index()) != owner && n.get_task(name) == Some(task));
            if let Some(holder) = holder {
                return Err(FleetError::InvalidArgument(format!(
                    "graph task '{name}' is still held by node {holder}"
                )));
            }
        }
        Ok(())
    }

    fn adopt_tasks(&mut self, tasks: Vec<TaskId>, node: NodeId) -> Result<()> {
        for task in tasks {
            self.tasks.set_node(task, node)?;
            self.tasks.reset(task);
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Handle of the node named `name`.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name() == name).map(Node::index)
    }

    fn ensure_node(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or_else(|| no_such_node(id))
    }

    // ---- tasks ----------------------------------------------------------

    pub fn tasks(&self) -> &TaskArena {
        &self.tasks
    }

    fn ensure_task(&self, task: TaskId) -> Result<&Task> {
        self.tasks.get(task).ok_or_else(|| {
            FleetError::InvalidArgument(format!("{task} is not a task of {self}"))
        })
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn concurrency(&self) -> &ConcurrencyRegistry {
        &self.concurrency
    }

    /// Every task of every node, in node order then graph insertion order.
    pub fn each_task(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.iter().flat_map(Node::task_ids)
    }

    /// Create a task on `node`; returns the existing task if the name is
    /// already taken there.
    pub fn add_new_task(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        data: Option<TaskData>,
    ) -> Result<TaskId> {
        let node = self
            .nodes
            .get_mut(node.index())
            .ok_or_else(|| no_such_node(node))?;
        node.graph_mut().add_new_task(&mut self.tasks, name, data)
    }

    /// Add an existing task to the graph of its own node.
    pub fn add_task(&mut self, task: TaskId) -> Result<TaskId> {
        let owner = self.ensure_task(task)?.node();
        let node = self
            .nodes
            .get_mut(owner.index())
            .ok_or_else(|| no_such_node(owner))?;
        node.graph_mut().add_task(&self.tasks, task)
    }

    pub fn get_task<'a>(&self, node: NodeId, task: impl Into<TaskRef<'a>>) -> Option<TaskId> {
        self.node(node)?.graph().resolve(&self.tasks, task)
    }

    /// Take a task out of its node's graph.
    ///
    /// Edges to and from the task stay in place, so its dependents keep
    /// waiting on it.
    pub fn remove_task<'a>(
        &mut self,
        node: NodeId,
        task: impl Into<TaskRef<'a>>,
    ) -> Option<TaskId> {
        let node = self.nodes.get_mut(node.index())?;
        let removed = node.graph_mut().remove_task(&self.tasks, task)?;
        if node.current_task() == Some(removed) {
            let _ = node.set_task(&self.tasks, None);
        }
        Some(removed)
    }

    /// Move a task to another existing node.
    pub fn set_task_node(&mut self, task: TaskId, node: NodeId) -> Result<()> {
        self.ensure_node(node)?;
        let previous = self.ensure_task(task)?.node();
        if previous == node {
            return Ok(());
        }

        let name = self.tasks.at(task).name().to_string();
        if self.nodes[node.index()].get_task(&name).is_some() {
            return Err(FleetError::InvalidArgument(format!(
                "node {} already has a task named '{name}'",
                self.nodes[node.index()]
            )));
        }

        if let Some(old) = self.nodes.get_mut(previous.index()) {
            old.graph_mut().remove_task(&self.tasks, task);
        }
        self.tasks.set_node(task, node)?;
        self.nodes[node.index()]
            .graph_mut()
            .add_task(&self.tasks, task)?;
        self.tasks.reset(task);
        Ok(())
    }

    // ---- dependencies ---------------------------------------------------

    /// Make `to` depend on `from`; bare names resolve in `node`'s graph.
    pub fn add_dependency<'a, 'b>(
        &mut self,
        node: NodeId,
        from: impl Into<TaskRef<'a>>,
        to: impl Into<TaskRef<'b>>,
    ) -> Result<()> {
        let node = self.nodes.get(node.index()).ok_or_else(|| no_such_node(node))?;
        node.graph().add_dependency(&mut self.tasks, from, to)
    }

    /// Make `task` depend on `dependency`, on any nodes.
    pub fn depends(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        self.tasks.add_backward_dependency(task, dependency)
    }

    pub fn remove_dependency(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        self.tasks.remove_backward_dependency(task, dependency)
    }

    // ---- status & readiness ---------------------------------------------

    pub fn set_task_status(&mut self, task: TaskId, status: TaskStatus) -> Result<()> {
        self.tasks.set_status(task, status, &mut self.concurrency)
    }

    pub fn set_task_status_str(&mut self, task: TaskId, status: &str) -> Result<()> {
        self.tasks.set_status_str(task, status, &mut self.concurrency)
    }

    /// Drop memoized readiness of `task` and everything downstream.
    pub fn reset_task(&self, task: TaskId) -> Result<()> {
        self.ensure_task(task)?;
        self.tasks.reset(task);
        Ok(())
    }

    /// Pending, dependencies done and none failed, and a concurrency slot
    /// free.
    pub fn task_ready(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.ready(task, &self.concurrency))
    }

    /// Failed itself, or blocked by a failed dependency.
    pub fn task_failed(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.failed(task))
    }

    pub fn task_finished(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.finished(task))
    }

    pub fn dependencies_are_ready(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.dependencies_are_ready(task))
    }

    pub fn dependencies_have_failed(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.dependencies_have_failed(task))
    }

    pub fn concurrency_available(&self, task: TaskId) -> Result<bool> {
        self.ensure_task(task)?;
        Ok(self.tasks.concurrency_available(task, &self.concurrency))
    }

    pub fn set_maximum_concurrency(&mut self, name: &str, maximum: usize) {
        self.concurrency.set_maximum(name, maximum);
    }

    pub fn maximum_concurrency(&self, name: &str) -> usize {
        self.concurrency.maximum(name)
    }

    pub fn current_concurrency(&self, name: &str) -> usize {
        self.concurrency.current(name)
    }

    // ---- labels ---------------------------------------------------------

    /// `node/task` rendering of a task.
    pub fn task_label(&self, task: TaskId) -> String {
        match self.tasks.get(task) {
            Some(t) => match self.node(t.node()) {
                Some(node) => format!("{}/{}", node.name(), t.name()),
                None => t.name().to_string(),
            },
            None => task.to_string(),
        }
    }

    /// Sorted labels of the tasks `task` waits for.
    pub fn backward_dependency_labels(&self, task: TaskId) -> Vec<String> {
        let mut labels: Vec<String> = self
            .tasks
            .get(task)
            .into_iter()
            .flat_map(Task::backward_dependencies)
            .map(|dep| self.task_label(dep))
            .collect();
        labels.sort();
        labels
    }

    /// Sorted labels of the tasks waiting for `task`.
    pub fn forward_dependency_labels(&self, task: TaskId) -> Vec<String> {
        let mut labels: Vec<String> = self
            .tasks
            .get(task)
            .into_iter()
            .flat_map(Task::forward_dependencies)
            .map(|dep| self.task_label(dep))
            .collect();
        labels.sort();
        labels
    }

    // ---- run loop -------------------------------------------------------

    /// Order every task of every node, dependencies first.
    ///
    /// Fails with [`FleetError::LoopDetected`] when the forward edges form
    /// a loop anywhere in the fleet.
    pub fn topology_sort(&self) -> Result<Vec<TaskId>> {
        topology::topology_sort(&self.tasks, self.each_task(), |t| self.task_label(t))
    }

    /// Mark `task` running and hand it to its node.
    ///
    /// The task goes back to its previous status if the node refuses it.
    pub fn run_task(&mut self, task: TaskId) -> Result<()> {
        let t = self.ensure_task(task)?;
        let (owner, previous) = (t.node(), t.status());
        let node = self.ensure_node(owner)?;
        if node.get_task(t.name()) != Some(task) {
            return Err(FleetError::InvalidArgument(format!(
                "{task} is not found in the graph of {node}"
            )));
        }
        info!(task = %self.task_label(task), "dispatching task");

        self.tasks
            .set_status(task, TaskStatus::Running, &mut self.concurrency)?;
        let dispatched =
            self.nodes[owner.index()].run(task, &mut self.tasks, &mut self.concurrency);
        if dispatched.is_err() {
            self.tasks
                .set_status(task, previous, &mut self.concurrency)?;
        }
        dispatched
    }

    /// Poll one node and dispatch its next ready task, if it is online.
    ///
    /// Returns the dispatched task.
    pub fn process_node(&mut self, node: NodeId) -> Result<Option<TaskId>> {
        self.ensure_node(node)?;
        let index = node.index();
        self.nodes[index].poll(&mut self.tasks, &mut self.concurrency)?;

        let node = &self.nodes[index];
        if !node.online() {
            return Ok(None);
        }
        let Some(task) = node.ready_task(&self.tasks, &self.concurrency) else {
            return Ok(None);
        };
        self.run_task(task)?;
        Ok(Some(task))
    }

    /// One tick over every node in order.
    pub fn process_all_nodes(&mut self) -> Result<Vec<TaskId>> {
        let mut dispatched = Vec::new();
        for index in 0..self.nodes.len() {
            if let Some(task) = self.process_node(NodeId(index))? {
                dispatched.push(task);
            }
        }
        Ok(dispatched)
    }

    /// How the run ends now, or `None` if it must go on.
    pub fn check_termination(&self) -> Option<RunOutcome> {
        if self.all_nodes_are_successful() {
            info!(process = %self, "all nodes are successful");
            return Some(RunOutcome::Succeeded);
        }

        let critical = self.failed_critical_nodes();
        if !critical.is_empty() {
            warn!(process = %self, nodes = ?critical, "critical nodes have failed");
            return Some(RunOutcome::Failed(FailureReason::CriticalNodesFailed(
                critical,
            )));
        }

        if self.all_nodes_are_finished() {
            let failed = self.failed_nodes();
            if failed.is_empty() {
                info!(process = %self, "all nodes are finished");
                return Some(RunOutcome::Succeeded);
            }
            warn!(process = %self, nodes = ?failed, "all nodes are finished with failures");
            return Some(RunOutcome::Failed(FailureReason::NodesFailed(failed)));
        }

        None
    }

    /// Run the fleet to completion.
    ///
    /// A loop in the task graph is reported before anything is dispatched.
    /// Nothing here sleeps: pacing is up to the node executors.
    pub fn run(&mut self) -> Result<RunOutcome> {
        let order = self.topology_sort()?;
        info!(process = %self, nodes = self.nodes.len(), tasks = order.len(), "starting run");

        loop {
            if let Some(outcome) = self.check_termination() {
                info!(process = %self, outcome = %outcome, "run finished");
                return Ok(outcome);
            }
            self.process_all_nodes()?;
        }
    }

    // ---- aggregates -----------------------------------------------------

    pub fn all_nodes_are_successful(&self) -> bool {
        self.nodes.iter().all(|n| n.successful(&self.tasks))
    }

    pub fn all_nodes_are_finished(&self) -> bool {
        self.nodes.iter().all(|n| n.finished(&self.tasks))
    }

    /// Names of nodes that failed.
    pub fn failed_nodes(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.failed(&self.tasks))
            .map(|n| n.name().to_string())
            .collect()
    }

    pub fn critical_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_critical())
    }

    /// Names of critical nodes that failed.
    pub fn failed_critical_nodes(&self) -> Vec<String> {
        self.critical_nodes()
            .filter(|n| n.failed(&self.tasks))
            .map(|n| n.name().to_string())
            .collect()
    }

    pub fn tasks_total_count(&self) -> usize {
        self.nodes.iter().map(Node::tasks_total_count).sum()
    }

    pub fn tasks_finished_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tasks_finished_count(&self.tasks)).sum()
    }

    pub fn tasks_failed_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tasks_failed_count(&self.tasks)).sum()
    }

    pub fn tasks_successful_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tasks_successful_count(&self.tasks)).sum()
    }

    pub fn tasks_pending_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tasks_pending_count(&self.tasks)).sum()
    }

    pub fn tasks_running_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.graph().tasks_running_count(&self.tasks))
            .sum()
    }
}

fn no_such_node(id: NodeId) -> FleetError {
    FleetError::InvalidArgument(format!("there is no node with index {id}"))
}
