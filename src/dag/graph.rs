// src/dag/graph.rs

use std::cell::Cell;

use indexmap::IndexMap;
use tracing::debug;

use crate::dag::concurrency::ConcurrencyRegistry;
use crate::dag::task::{NodeId, TaskArena, TaskData, TaskId};
use crate::errors::{FleetError, Result};

/// A task given either by handle or by name.
///
/// Names are always resolved inside one graph, so dependencies between
/// nodes have to be wired with handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRef<'a> {
    Id(TaskId),
    Name(&'a str),
}

impl From<TaskId> for TaskRef<'_> {
    fn from(id: TaskId) -> Self {
        TaskRef::Id(id)
    }
}

impl<'a> From<&'a str> for TaskRef<'a> {
    fn from(name: &'a str) -> Self {
        TaskRef::Name(name)
    }
}

impl<'a> From<&'a String> for TaskRef<'a> {
    fn from(name: &'a String) -> Self {
        TaskRef::Name(name.as_str())
    }
}

/// The tasks owned by one node, keyed by name in insertion order.
///
/// Aggregate queries latch a `true` answer until the next [`Graph::reset`]
/// (on task add/remove) and never store `false`. Task statuses change
/// without the graph being told, so a task moved back to pending after the
/// graph reported success is not noticed until the task set changes.
#[derive(Debug, Clone)]
pub struct Graph {
    node: NodeId,
    tasks: IndexMap<String, TaskId>,
    tasks_are_finished: Cell<bool>,
    tasks_are_successful: Cell<bool>,
    tasks_have_failed: Cell<bool>,
}

impl Graph {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            tasks: IndexMap::new(),
            tasks_are_finished: Cell::new(false),
            tasks_are_successful: Cell::new(false),
            tasks_have_failed: Cell::new(false),
        }
    }

    /// The node owning this graph.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn set_node(&mut self, node: NodeId) {
        self.node = node;
    }

    /// Drop the latched aggregate answers.
    pub fn reset(&self) {
        self.tasks_are_finished.set(false);
        self.tasks_are_successful.set(false);
        self.tasks_have_failed.set(false);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task handles in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.values().copied()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    /// Look a task up by name.
    pub fn get_task(&self, name: &str) -> Option<TaskId> {
        self.tasks.get(name).copied()
    }

    /// Resolve a handle or a name to the handle stored in this graph.
    ///
    /// A handle resolves through its task's name, so it matches the task of
    /// the same name in this graph. Never fails; unknown tasks give `None`.
    pub fn resolve<'a>(&self, tasks: &TaskArena, task: impl Into<TaskRef<'a>>) -> Option<TaskId> {
        match task.into() {
            TaskRef::Name(name) => self.get_task(name),
            TaskRef::Id(id) => tasks.get(id).and_then(|t| self.get_task(t.name())),
        }
    }

    pub fn has_task<'a>(&self, tasks: &TaskArena, task: impl Into<TaskRef<'a>>) -> bool {
        self.resolve(tasks, task).is_some()
    }

    /// Add an existing task of this graph's node.
    ///
    /// Adding a task whose name is already present returns the task already
    /// stored under that name.
    pub fn add_task(&mut self, tasks: &TaskArena, id: TaskId) -> Result<TaskId> {
        let task = tasks.get(id).ok_or_else(|| {
            FleetError::InvalidArgument(format!(
                "graph can add only tasks of this process, got {id}"
            ))
        })?;

        if let Some(existing) = self.get_task(task.name()) {
            return Ok(existing);
        }

        if task.node() != self.node {
            return Err(FleetError::InvalidArgument(format!(
                "graph of node {} cannot add task '{}' owned by node {}",
                self.node,
                task.name(),
                task.node()
            )));
        }

        self.tasks.insert(task.name().to_string(), id);
        self.reset();
        debug!(task = %task.name(), node = %self.node, "task added to graph");
        Ok(id)
    }

    /// Create a task for this graph's node and add it.
    ///
    /// Returns the existing task if the name is taken; `data` is ignored in
    /// that case.
    pub fn add_new_task(
        &mut self,
        tasks: &mut TaskArena,
        name: impl Into<String>,
        data: Option<TaskData>,
    ) -> Result<TaskId> {
        let name = name.into();
        if let Some(existing) = self.get_task(&name) {
            return Ok(existing);
        }
        let id = tasks.create(name, self.node, data);
        self.add_task(tasks, id)
    }

    /// Remove a task from this graph.
    ///
    /// Dependency edges pointing at the removed task are left in place.
    pub fn remove_task<'a>(
        &mut self,
        tasks: &TaskArena,
        task: impl Into<TaskRef<'a>>,
    ) -> Option<TaskId> {
        let id = self.resolve(tasks, task)?;
        let name = tasks.get(id)?.name().to_string();
        let removed = self.tasks.shift_remove(&name);
        self.reset();
        debug!(task = %name, node = %self.node, "task removed from graph");
        removed
    }

    /// Make `to` depend on `from`.
    ///
    /// Names are looked up in this graph; handles may belong to any node.
    pub fn add_dependency<'a, 'b>(
        &self,
        tasks: &mut TaskArena,
        from: impl Into<TaskRef<'a>>,
        to: impl Into<TaskRef<'b>>,
    ) -> Result<()> {
        let from = self.lookup(from.into())?;
        let to = self.lookup(to.into())?;
        tasks.add_backward_dependency(to, from)
    }

    fn lookup(&self, task: TaskRef<'_>) -> Result<TaskId> {
        match task {
            TaskRef::Id(id) => Ok(id),
            TaskRef::Name(name) => self.get_task(name).ok_or_else(|| {
                FleetError::NoSuchTask(format!(
                    "there is no task '{name}' in the graph of node {}",
                    self.node
                ))
            }),
        }
    }

    /// Handles of this graph that `tasks` knows about; queries skip the rest.
    fn known<'t>(&'t self, tasks: &'t TaskArena) -> impl Iterator<Item = TaskId> + 't {
        self.task_ids().filter(|id| tasks.contains(*id))
    }

    /// First task in insertion order that is ready to run.
    pub fn ready_task(
        &self,
        tasks: &TaskArena,
        concurrency: &ConcurrencyRegistry,
    ) -> Option<TaskId> {
        self.known(tasks).find(|id| tasks.ready(*id, concurrency))
    }

    pub fn tasks_are_finished(&self, tasks: &TaskArena) -> bool {
        if self.tasks_are_finished.get() {
            return true;
        }
        let finished = self.known(tasks).all(|id| tasks.finished(id));
        if finished {
            debug!(node = %self.node, "all tasks are finished");
            self.tasks_are_finished.set(true);
        }
        finished
    }

    pub fn tasks_are_successful(&self, tasks: &TaskArena) -> bool {
        if self.tasks_are_successful.get() {
            return true;
        }
        if self.tasks_have_failed.get() {
            return false;
        }
        let successful = self.known(tasks).all(|id| tasks.successful(id));
        if successful {
            debug!(node = %self.node, "all tasks are successful");
            self.tasks_are_successful.set(true);
        }
        successful
    }

    pub fn tasks_have_failed(&self, tasks: &TaskArena) -> bool {
        if self.tasks_have_failed.get() {
            return true;
        }
        let failed: Vec<&str> = self
            .known(tasks)
            .filter(|id| tasks.failed(*id))
            .map(|id| tasks.at(id).name())
            .collect();
        if failed.is_empty() {
            return false;
        }
        debug!(node = %self.node, failed = ?failed, "found failed tasks");
        self.tasks_have_failed.set(true);
        true
    }

    pub fn tasks_total_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks_finished_count(&self, tasks: &TaskArena) -> usize {
        self.known(tasks).filter(|id| tasks.finished(*id)).count()
    }

    pub fn tasks_failed_count(&self, tasks: &TaskArena) -> usize {
        self.known(tasks).filter(|id| tasks.failed(*id)).count()
    }

    pub fn tasks_successful_count(&self, tasks: &TaskArena) -> usize {
        self.known(tasks).filter(|id| tasks.successful(*id)).count()
    }

    pub fn tasks_pending_count(&self, tasks: &TaskArena) -> usize {
        self.known(tasks).filter(|id| tasks.at(*id).pending()).count()
    }

    pub fn tasks_running_count(&self, tasks: &TaskArena) -> usize {
        self.known(tasks).filter(|id| tasks.at(*id).running()).count()
    }
}
