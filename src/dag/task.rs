// src/dag/task.rs

//! Task records, dependency edges and memoized readiness.
//!
//! Every task of every node lives in one [`TaskArena`] and is addressed by a
//! [`TaskId`] handle. Dependency edges are stored as mirrored pairs of
//! handles: `b` is in `a.forward` exactly when `a` is in `b.backward`. The
//! arena only exposes operations that update both sides at once.

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::dag::concurrency::ConcurrencyRegistry;
use crate::errors::{FleetError, Result};
use crate::types::TaskStatus;

/// Opaque payload carried for the execution collaborator.
pub type TaskData = toml::Value;

/// Handle of a task inside a [`TaskArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a node inside a [`Process`](crate::engine::Process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single unit of work owned by one node.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    node: NodeId,
    status: TaskStatus,
    /// Tasks that must complete before this one may run.
    backward: IndexSet<TaskId>,
    /// Tasks that require this one.
    forward: IndexSet<TaskId>,
    data: Option<TaskData>,
    /// `None` until computed, then cached until the next reset.
    dependencies_are_ready: Cell<Option<bool>>,
    dependencies_have_failed: Cell<Option<bool>>,
}

impl Task {
    fn new(name: impl Into<String>, node: NodeId, data: Option<TaskData>) -> Self {
        Self {
            name: name.into(),
            node,
            status: TaskStatus::Pending,
            backward: IndexSet::new(),
            forward: IndexSet::new(),
            data,
            dependencies_are_ready: Cell::new(None),
            dependencies_have_failed: Cell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn data(&self) -> Option<&TaskData> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: Option<TaskData>) {
        self.data = data;
    }

    pub fn backward_dependencies(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.backward.iter().copied()
    }

    pub fn forward_dependencies(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.forward.iter().copied()
    }

    pub(crate) fn forward_dependency_at(&self, index: usize) -> Option<TaskId> {
        self.forward.get_index(index).copied()
    }

    pub fn has_backward_dependencies(&self) -> bool {
        !self.backward.is_empty()
    }

    pub fn has_forward_dependencies(&self) -> bool {
        !self.forward.is_empty()
    }

    pub fn pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn successful(&self) -> bool {
        self.status == TaskStatus::Successful
    }

    pub fn skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }

    fn clear_memo(&self) {
        self.dependencies_are_ready.set(None);
        self.dependencies_have_failed.set(None);
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task[{}]", self.name)
    }
}

/// Storage for every task of a process.
#[derive(Debug, Clone, Default)]
pub struct TaskArena {
    tasks: Vec<Task>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new pending task owned by `node`.
    ///
    /// The task is not part of any graph until it is added to one.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        node: NodeId,
        data: Option<TaskData>,
    ) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.tasks.push(Task::new(name, node, data));
        id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        id.0 < self.tasks.len()
    }

    /// The task behind a handle already checked against this arena.
    pub(crate) fn at(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().enumerate().map(|(i, t)| (TaskId(i), t))
    }

    fn ensure(&self, id: TaskId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(FleetError::InvalidArgument(format!(
                "{id} is not a task of this process"
            )))
        }
    }

    pub(crate) fn set_node(&mut self, id: TaskId, node: NodeId) -> Result<()> {
        self.ensure(id)?;
        self.tasks[id.0].node = node;
        Ok(())
    }

    // ---- status ---------------------------------------------------------

    /// Change the status of a task.
    ///
    /// Adjusts the shared running counter of the task's name when a limit is
    /// set, then applies the status. Terminal statuses invalidate the
    /// memoized readiness of every transitive forward dependent.
    pub fn set_status(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        concurrency: &mut ConcurrencyRegistry,
    ) -> Result<()> {
        self.ensure(id)?;
        let task = &mut self.tasks[id.0];
        let previous = task.status;

        if concurrency.is_limited(&task.name) {
            if status == TaskStatus::Running && previous != TaskStatus::Running {
                let current = concurrency.increase(&task.name);
                info!(task = %task.name, current, "increasing concurrency");
            } else if previous == TaskStatus::Running && status != TaskStatus::Running {
                let current = concurrency.decrease(&task.name);
                info!(task = %task.name, current, "decreasing concurrency");
            }
        }

        task.status = status;
        task.clear_memo();
        debug!(task = %task.name, from = %previous, to = %status, "task status changed");

        if status.is_terminal() {
            self.reset_forward(id);
        }
        Ok(())
    }

    /// Parse and apply a status given as text.
    pub fn set_status_str(
        &mut self,
        id: TaskId,
        status: &str,
        concurrency: &mut ConcurrencyRegistry,
    ) -> Result<()> {
        let status = status.parse::<TaskStatus>()?;
        self.set_status(id, status, concurrency)
    }

    // ---- edges ----------------------------------------------------------

    /// Make `task` require `dependency`.
    pub fn add_backward_dependency(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        self.ensure(task)?;
        self.ensure(dependency)?;
        self.tasks[task.0].backward.insert(dependency);
        self.tasks[dependency.0].forward.insert(task);
        self.reset(task);
        Ok(())
    }

    /// Make `dependent` require `task`.
    pub fn add_forward_dependency(&mut self, task: TaskId, dependent: TaskId) -> Result<()> {
        self.ensure(task)?;
        self.ensure(dependent)?;
        self.tasks[task.0].forward.insert(dependent);
        self.tasks[dependent.0].backward.insert(task);
        self.reset(task);
        Ok(())
    }

    pub fn remove_backward_dependency(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        self.ensure(task)?;
        self.ensure(dependency)?;
        self.tasks[task.0].backward.shift_remove(&dependency);
        self.tasks[dependency.0].forward.shift_remove(&task);
        self.reset(task);
        Ok(())
    }

    pub fn remove_forward_dependency(&mut self, task: TaskId, dependent: TaskId) -> Result<()> {
        self.ensure(task)?;
        self.ensure(dependent)?;
        self.tasks[task.0].forward.shift_remove(&dependent);
        self.tasks[dependent.0].backward.shift_remove(&task);
        self.reset(task);
        // `task` may have been the only link to `dependent`.
        self.reset(dependent);
        Ok(())
    }

    /// True only if both mirrored edges are present.
    pub fn has_backward_dependency(&self, task: TaskId, dependency: TaskId) -> Result<bool> {
        self.ensure(task)?;
        self.ensure(dependency)?;
        Ok(self.tasks[task.0].backward.contains(&dependency)
            && self.tasks[dependency.0].forward.contains(&task))
    }

    pub fn has_forward_dependency(&self, task: TaskId, dependent: TaskId) -> Result<bool> {
        self.has_backward_dependency(dependent, task)
    }

    // ---- memoization ----------------------------------------------------

    /// Invalidate the memoized state of `id` and of everything downstream.
    pub(crate) fn reset(&self, id: TaskId) {
        self.reset_from(vec![id]);
    }

    /// Invalidate everything downstream of `id`, but not `id` itself.
    pub(crate) fn reset_forward(&self, id: TaskId) {
        self.reset_from(self.at(id).forward.iter().copied().collect());
    }

    fn reset_from(&self, mut stack: Vec<TaskId>) {
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            let task = self.at(current);
            task.clear_memo();
            stack.extend(task.forward.iter().copied());
        }
    }

    // ---- readiness ------------------------------------------------------

    /// Every backward dependency is successful or skipped.
    pub(crate) fn dependencies_are_ready(&self, id: TaskId) -> bool {
        let task = self.at(id);
        if let Some(ready) = task.dependencies_are_ready.get() {
            return ready;
        }
        if task.dependencies_have_failed.get() == Some(true) {
            return false;
        }

        let ready = task
            .backward
            .iter()
            .all(|dep| self.at(*dep).successful() || self.at(*dep).skipped());
        if ready {
            debug!(task = %task.name, "all dependencies are ready");
        }
        task.dependencies_are_ready.set(Some(ready));
        ready
    }

    /// Some backward dependency has failed, directly or through its own
    /// dependencies.
    pub(crate) fn dependencies_have_failed(&self, id: TaskId) -> bool {
        let mut visiting = HashSet::new();
        self.dependencies_have_failed_inner(id, &mut visiting)
    }

    fn dependencies_have_failed_inner(&self, id: TaskId, visiting: &mut HashSet<TaskId>) -> bool {
        let task = self.at(id);
        if let Some(failed) = task.dependencies_have_failed.get() {
            return failed;
        }
        // Reached again while still being evaluated: a loop, which the
        // process pre-flight rejects. Treat the back edge as not failed.
        if !visiting.insert(id) {
            return false;
        }

        let failed: Vec<&str> = task
            .backward
            .iter()
            .filter(|dep| self.failed_inner(**dep, visiting))
            .map(|dep| self.at(*dep).name.as_str())
            .collect();
        if !failed.is_empty() {
            debug!(task = %task.name, failed = ?failed, "found failed dependencies");
        }

        let result = !failed.is_empty();
        task.dependencies_have_failed.set(Some(result));
        result
    }

    fn failed_inner(&self, id: TaskId, visiting: &mut HashSet<TaskId>) -> bool {
        self.at(id).status == TaskStatus::Failed
            || self.dependencies_have_failed_inner(id, visiting)
    }

    /// The task failed itself or is blocked by a failed dependency.
    pub(crate) fn failed(&self, id: TaskId) -> bool {
        self.at(id).status == TaskStatus::Failed || self.dependencies_have_failed(id)
    }

    /// The task will not run again in this process.
    pub(crate) fn finished(&self, id: TaskId) -> bool {
        let task = self.at(id);
        task.successful() || task.skipped() || self.failed(id)
    }

    pub(crate) fn successful(&self, id: TaskId) -> bool {
        self.at(id).successful()
    }

    /// No limit on the task's name, or a free slot under it.
    pub(crate) fn concurrency_available(
        &self,
        id: TaskId,
        concurrency: &ConcurrencyRegistry,
    ) -> bool {
        concurrency.available(&self.at(id).name)
    }

    /// Pending, no failed dependencies, all dependencies done, and a
    /// concurrency slot free.
    pub(crate) fn ready(&self, id: TaskId, concurrency: &ConcurrencyRegistry) -> bool {
        self.at(id).pending()
            && !self.dependencies_have_failed(id)
            && self.dependencies_are_ready(id)
            && self.concurrency_available(id, concurrency)
    }
}
