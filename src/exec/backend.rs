// src/exec/backend.rs

//! Pluggable execution capability of a node.
//!
//! The scheduler never runs anything itself. Each node holds a
//! [`NodeExecutor`] that starts work for a dispatched task and later reports
//! completion when polled. Production code uses
//! [`CommandExecutor`](crate::exec::CommandExecutor); tests provide scripted
//! executors that complete tasks on the next poll.

use tracing::{debug, info};

use crate::dag::{ConcurrencyRegistry, Graph, NodeId, Task, TaskArena, TaskId};
use crate::errors::{FleetError, Result};
use crate::types::{NodeStatus, TaskStatus};

/// The run/poll contract a concrete node type fulfils.
pub trait NodeExecutor: Send {
    /// Begin executing `task`, which the process has just marked running.
    ///
    /// Implementations are expected to call [`NodeContext::begin`], which
    /// rejects tasks that are not in this node's graph and turns the node
    /// busy. Must not block.
    fn dispatch(&mut self, node: &mut NodeContext<'_>, task: TaskId) -> Result<()>;

    /// Check on the work started by `dispatch`.
    ///
    /// Called once per tick, whether the node is busy or idle. On completion,
    /// call [`NodeContext::complete`] with the terminal status. Must not
    /// block.
    fn poll(&mut self, node: &mut NodeContext<'_>) -> Result<()>;
}

/// What an executor may see and change while it is being driven.
pub struct NodeContext<'a> {
    node: NodeId,
    name: &'a str,
    status: &'a mut NodeStatus,
    current: &'a mut Option<TaskId>,
    graph: &'a Graph,
    tasks: &'a mut TaskArena,
    concurrency: &'a mut ConcurrencyRegistry,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        name: &'a str,
        status: &'a mut NodeStatus,
        current: &'a mut Option<TaskId>,
        graph: &'a Graph,
        tasks: &'a mut TaskArena,
        concurrency: &'a mut ConcurrencyRegistry,
    ) -> Self {
        Self {
            node,
            name,
            status,
            current,
            graph,
            tasks,
            concurrency,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn status(&self) -> NodeStatus {
        *self.status
    }

    pub fn set_status(&mut self, status: NodeStatus) {
        debug!(node = %self.name, from = %*self.status, to = %status, "node status changed");
        *self.status = status;
    }

    pub fn online(&self) -> bool {
        *self.status == NodeStatus::Online
    }

    pub fn busy(&self) -> bool {
        *self.status == NodeStatus::Busy
    }

    /// The task currently dispatched on this node.
    pub fn current_task(&self) -> Option<TaskId> {
        *self.current
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Fleet-wide running counts, read-only.
    pub fn concurrency(&self) -> &ConcurrencyRegistry {
        self.concurrency
    }

    fn ensure_own(&self, task: TaskId) -> Result<()> {
        if self.graph.resolve(&*self.tasks, task) == Some(task) {
            Ok(())
        } else {
            Err(FleetError::InvalidArgument(format!(
                "task {task} is not found in the graph of node '{}'",
                self.name
            )))
        }
    }

    /// Record `task` as the current task and mark the node busy.
    pub fn begin(&mut self, task: TaskId) -> Result<()> {
        self.ensure_own(task)?;
        *self.current = Some(task);
        self.set_status(NodeStatus::Busy);
        Ok(())
    }

    /// Finish the current task with `status` and bring the node back online.
    pub fn complete(&mut self, status: TaskStatus) -> Result<()> {
        let task = self.current.take().ok_or_else(|| {
            FleetError::InvalidArgument(format!("node '{}' has no current task", self.name))
        })?;
        info!(
            node = %self.name,
            task = %self.tasks.at(task).name(),
            status = %status,
            "task finished"
        );
        self.tasks.set_status(task, status, &mut *self.concurrency)?;
        self.set_status(NodeStatus::Online);
        Ok(())
    }

    /// Set the status of any task of this node.
    pub fn set_task_status(&mut self, task: TaskId, status: TaskStatus) -> Result<()> {
        self.ensure_own(task)?;
        self.tasks.set_status(task, status, &mut *self.concurrency)
    }
}
