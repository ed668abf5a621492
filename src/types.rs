use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::FleetError;

/// Lifecycle status of a single task.
///
/// - `Pending`: not started yet (initial).
/// - `Running`: dispatched to its node and not observed finished.
/// - `Successful`, `Failed`, `Skipped`: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Successful,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Successful,
        TaskStatus::Failed,
        TaskStatus::Skipped,
    ];

    /// Statuses that can change the dependency state of forward dependents.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Successful | TaskStatus::Failed | TaskStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Successful => "successful",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "successful" => Ok(TaskStatus::Successful),
            "failed" => Ok(TaskStatus::Failed),
            "skipped" => Ok(TaskStatus::Skipped),
            other => Err(FleetError::InvalidStatus(format!(
                "invalid task status: {other} (expected one of pending, running, successful, failed, skipped)"
            ))),
        }
    }
}

/// Status of a node, independent of the statuses of its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Ready to accept a task (initial).
    Online,
    /// Running a task.
    Busy,
    /// Temporarily unable to accept tasks.
    Offline,
    Failed,
    Successful,
    Skipped,
}

impl NodeStatus {
    /// A node with one of these statuses is finished regardless of its tasks.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            NodeStatus::Failed | NodeStatus::Successful | NodeStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Busy => "busy",
            NodeStatus::Offline => "offline",
            NodeStatus::Failed => "failed",
            NodeStatus::Successful => "successful",
            NodeStatus::Skipped => "skipped",
        }
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Online
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(NodeStatus::Online),
            "busy" => Ok(NodeStatus::Busy),
            "offline" => Ok(NodeStatus::Offline),
            "failed" => Ok(NodeStatus::Failed),
            "successful" => Ok(NodeStatus::Successful),
            "skipped" => Ok(NodeStatus::Skipped),
            other => Err(FleetError::InvalidStatus(format!(
                "invalid node status: {other} (expected one of online, busy, offline, failed, successful, skipped)"
            ))),
        }
    }
}
