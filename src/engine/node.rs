// src/engine/node.rs

use std::fmt;
use std::mem;

use tracing::debug;

use crate::dag::{ConcurrencyRegistry, Graph, NodeId, TaskArena, TaskId, TaskRef};
use crate::errors::{FleetError, Result};
use crate::exec::{NodeContext, NodeExecutor};
use crate::types::NodeStatus;

/// Handle value of a node that has not been added to a process yet.
const UNATTACHED: NodeId = NodeId(usize::MAX);

/// An execution target: one graph of tasks plus the executor that runs them.
///
/// Graph queries that need task state take the process-owned
/// [`TaskArena`] (and [`ConcurrencyRegistry`] for readiness) explicitly.
pub struct Node {
    name: String,
    id: String,
    status: NodeStatus,
    task: Option<TaskId>,
    graph: Graph,
    critical: bool,
    executor: Option<Box<dyn NodeExecutor>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("status", &self.status)
            .field("task", &self.task)
            .field("critical", &self.critical)
            .field("tasks", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.name {
            write!(f, "Node[{}]", self.id)
        } else {
            write!(f, "Node[{}/{}]", self.id, self.name)
        }
    }
}

impl Node {
    /// A new online node with an empty graph and no executor.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            status: NodeStatus::Online,
            task: None,
            graph: Graph::new(UNATTACHED),
            critical: false,
            executor: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_executor(mut self, executor: impl NodeExecutor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Start out with `graph`; its tasks are checked and re-parented by
    /// [`Process::add_node`](crate::engine::Process::add_node).
    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.set_graph(graph);
        self
    }

    pub(crate) fn attach(&mut self, id: NodeId) {
        self.graph.set_node(id);
    }

    /// Handle of this node in its process.
    pub fn index(&self) -> NodeId {
        self.graph.node()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn set_critical(&mut self, critical: bool) {
        self.critical = critical;
    }

    pub fn set_executor(&mut self, executor: impl NodeExecutor + 'static) {
        self.executor = Some(Box::new(executor));
    }

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    // ---- status ---------------------------------------------------------

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn set_status(&mut self, status: NodeStatus) {
        debug!(node = %self, from = %self.status, to = %status, "node status changed");
        self.status = status;
    }

    pub fn set_status_str(&mut self, status: &str) -> Result<()> {
        let status = status.parse::<NodeStatus>()?;
        self.set_status(status);
        Ok(())
    }

    pub fn online(&self) -> bool {
        self.status == NodeStatus::Online
    }

    pub fn busy(&self) -> bool {
        self.status == NodeStatus::Busy
    }

    pub fn offline(&self) -> bool {
        self.status == NodeStatus::Offline
    }

    pub fn skipped(&self) -> bool {
        self.status == NodeStatus::Skipped
    }

    /// Finished by status, or every task finished.
    pub fn finished(&self, tasks: &TaskArena) -> bool {
        self.status.is_finished() || self.graph.tasks_are_finished(tasks)
    }

    /// Failed by status, or some task failed.
    pub fn failed(&self, tasks: &TaskArena) -> bool {
        self.status == NodeStatus::Failed || self.graph.tasks_have_failed(tasks)
    }

    /// Successful by status, or every task successful.
    pub fn successful(&self, tasks: &TaskArena) -> bool {
        self.status == NodeStatus::Successful || self.graph.tasks_are_successful(tasks)
    }

    // ---- current task ---------------------------------------------------

    pub fn current_task(&self) -> Option<TaskId> {
        self.task
    }

    /// Set or clear the current task; it must belong to this node's graph.
    pub fn set_task(&mut self, tasks: &TaskArena, task: Option<TaskId>) -> Result<()> {
        if let Some(id) = task {
            if self.graph.resolve(tasks, id) != Some(id) {
                return Err(FleetError::InvalidArgument(format!(
                    "{self}: task {id} is not found in the graph"
                )));
            }
        }
        self.task = task;
        Ok(())
    }

    // ---- graph ----------------------------------------------------------

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Replace the graph, re-parenting the new one to this node.
    ///
    /// Returns the previous graph. The tasks are re-parented by
    /// [`Process::set_node_graph`](crate::engine::Process::set_node_graph).
    pub(crate) fn set_graph(&mut self, mut graph: Graph) -> Graph {
        graph.set_node(self.graph.node());
        graph.reset();
        self.task = None;
        mem::replace(&mut self.graph, graph)
    }

    pub fn get_task(&self, name: &str) -> Option<TaskId> {
        self.graph.get_task(name)
    }

    pub fn has_task<'a>(&self, tasks: &TaskArena, task: impl Into<TaskRef<'a>>) -> bool {
        self.graph.has_task(tasks, task)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.task_ids()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.task_names()
    }

    pub fn ready_task(
        &self,
        tasks: &TaskArena,
        concurrency: &ConcurrencyRegistry,
    ) -> Option<TaskId> {
        self.graph.ready_task(tasks, concurrency)
    }

    pub fn tasks_are_finished(&self, tasks: &TaskArena) -> bool {
        self.graph.tasks_are_finished(tasks)
    }

    pub fn tasks_are_successful(&self, tasks: &TaskArena) -> bool {
        self.graph.tasks_are_successful(tasks)
    }

    pub fn tasks_have_failed(&self, tasks: &TaskArena) -> bool {
        self.graph.tasks_have_failed(tasks)
    }

    pub fn tasks_total_count(&self) -> usize {
        self.graph.tasks_total_count()
    }

    pub fn tasks_finished_count(&self, tasks: &TaskArena) -> usize {
        self.graph.tasks_finished_count(tasks)
    }

    pub fn tasks_failed_count(&self, tasks: &TaskArena) -> usize {
        self.graph.tasks_failed_count(tasks)
    }

    pub fn tasks_successful_count(&self, tasks: &TaskArena) -> usize {
        self.graph.tasks_successful_count(tasks)
    }

    pub fn tasks_pending_count(&self, tasks: &TaskArena) -> usize {
        self.graph.tasks_pending_count(tasks)
    }

    // ---- execution ------------------------------------------------------

    /// Hand `task` to the executor.
    pub(crate) fn run(
        &mut self,
        task: TaskId,
        tasks: &mut TaskArena,
        concurrency: &mut ConcurrencyRegistry,
    ) -> Result<()> {
        let label = self.to_string();
        let (executor, mut ctx) = self.split(tasks, concurrency);
        let executor = executor
            .ok_or_else(|| FleetError::NotImplemented(format!("{label}: run has no executor")))?;
        executor.dispatch(&mut ctx, task)
    }

    /// Let the executor observe progress.
    pub(crate) fn poll(
        &mut self,
        tasks: &mut TaskArena,
        concurrency: &mut ConcurrencyRegistry,
    ) -> Result<()> {
        let label = self.to_string();
        let (executor, mut ctx) = self.split(tasks, concurrency);
        let executor = executor
            .ok_or_else(|| FleetError::NotImplemented(format!("{label}: poll has no executor")))?;
        executor.poll(&mut ctx)
    }

    fn split<'a>(
        &'a mut self,
        tasks: &'a mut TaskArena,
        concurrency: &'a mut ConcurrencyRegistry,
    ) -> (Option<&'a mut Box<dyn NodeExecutor>>, NodeContext<'a>) {
        let Node {
            name,
            status,
            task,
            graph,
            executor,
            ..
        } = self;
        let ctx = NodeContext::new(graph.node(), name, status, task, graph, tasks, concurrency);
        (executor.as_mut(), ctx)
    }
}
