use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fleetdag::dag::TaskId;
use fleetdag::errors::Result;
use fleetdag::exec::{NodeContext, NodeExecutor};
use fleetdag::types::TaskStatus;

#[derive(Debug, Default)]
struct Script {
    /// Keyed by `node/task` or by bare task name.
    outcomes: HashMap<String, TaskStatus>,
    /// Extra polls a task stays running before it completes.
    hold_polls: usize,
    dispatched: Vec<String>,
    peak_running: HashMap<String, usize>,
}

/// Shared script and log of every [`FakeExecutor`] built from it.
#[derive(Debug, Clone, Default)]
pub struct FakeRecorder {
    inner: Arc<Mutex<Script>>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish `task` (a bare name or `node/task`) with `status` instead of
    /// successful.
    pub fn set_outcome(&self, task: &str, status: TaskStatus) {
        self.inner
            .lock()
            .unwrap()
            .outcomes
            .insert(task.to_string(), status);
    }

    /// Keep each dispatched task running for `polls` extra polls.
    pub fn set_hold_polls(&self, polls: usize) {
        self.inner.lock().unwrap().hold_polls = polls;
    }

    /// `node/task` labels in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.inner.lock().unwrap().dispatched.clone()
    }

    pub fn was_dispatched(&self, label: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .dispatched
            .iter()
            .any(|l| l == label)
    }

    /// Position of `label` in the dispatch order.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.inner
            .lock()
            .unwrap()
            .dispatched
            .iter()
            .position(|l| l == label)
    }

    /// Highest running count seen for a task name at dispatch time.
    pub fn peak_running(&self, name: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .peak_running
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// An executor for one node sharing this script.
    pub fn executor(&self) -> FakeExecutor {
        FakeExecutor {
            recorder: self.clone(),
            remaining: 0,
        }
    }

    fn outcome(&self, node: &str, task: &str) -> TaskStatus {
        let script = self.inner.lock().unwrap();
        script
            .outcomes
            .get(&format!("{node}/{task}"))
            .or_else(|| script.outcomes.get(task))
            .copied()
            .unwrap_or(TaskStatus::Successful)
    }
}

/// A scripted executor that:
/// - records which tasks were dispatched, and on which node
/// - completes each task on a later poll with its scripted status.
#[derive(Debug)]
pub struct FakeExecutor {
    recorder: FakeRecorder,
    remaining: usize,
}

impl NodeExecutor for FakeExecutor {
    fn dispatch(&mut self, node: &mut NodeContext<'_>, task: TaskId) -> Result<()> {
        node.begin(task)?;

        let name = node
            .task(task)
            .map(|t| t.name().to_string())
            .unwrap_or_default();
        let running = node.concurrency().current(&name);

        let mut script = self.recorder.inner.lock().unwrap();
        script.dispatched.push(format!("{}/{}", node.name(), name));
        let peak = script.peak_running.entry(name).or_insert(0);
        *peak = (*peak).max(running);
        self.remaining = script.hold_polls;
        Ok(())
    }

    fn poll(&mut self, node: &mut NodeContext<'_>) -> Result<()> {
        let Some(task) = node.current_task() else {
            return Ok(());
        };
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(());
        }

        let name = node
            .task(task)
            .map(|t| t.name().to_string())
            .unwrap_or_default();
        let status = self.recorder.outcome(node.name(), &name);
        node.complete(status)
    }
}
