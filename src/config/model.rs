// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::dag::TaskData;
use crate::types::{NodeStatus, TaskStatus};

/// Fleet file as read from TOML, before validation.
///
/// ```toml
/// [process]
/// id = "deploy"
/// tick_interval_ms = 50
///
/// [concurrency]
/// deploy = 2
///
/// [[node]]
/// name = "controller"
/// critical = true
///
/// [[node.task]]
/// name = "deploy"
/// cmd = "echo deploy"
/// after = ["prepare", "compute-1:prepare"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFleetFile {
    #[serde(default)]
    pub process: ProcessSection,

    /// Maximum number of same-named tasks running at once across the fleet.
    #[serde(default)]
    pub concurrency: BTreeMap<String, usize>,

    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

/// `[process]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
    #[serde(default)]
    pub id: Option<String>,

    /// Pause between two ticks of the command line driver.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            id: None,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// `[[node]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub name: String,

    /// Defaults to `name`.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub critical: bool,

    /// Initial node status, `online` when absent.
    #[serde(default)]
    pub status: Option<NodeStatus>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

impl NodeConfig {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// `[[node.task]]` entry.
///
/// Keys other than `name`, `after` and `status` are kept as the task's
/// data payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Tasks this one waits for: a task of the same node, or `node:task`.
    #[serde(default)]
    pub after: Vec<String>,

    /// Initial task status, `pending` when absent.
    #[serde(default)]
    pub status: Option<TaskStatus>,

    #[serde(flatten)]
    pub data: toml::Table,
}

impl TaskConfig {
    /// The payload handed to the task, `None` when there are no extra keys.
    pub fn data(&self) -> Option<TaskData> {
        if self.data.is_empty() {
            None
        } else {
            Some(toml::Value::Table(self.data.clone()))
        }
    }

    /// The `cmd` key of the payload, if it is a string.
    pub fn cmd(&self) -> Option<&str> {
        self.data.get("cmd").and_then(toml::Value::as_str)
    }

    /// `after` entries split into an optional node name and a task name.
    pub fn dependencies(&self) -> impl Iterator<Item = DependencyRef<'_>> {
        self.after.iter().map(|s| DependencyRef::parse(s))
    }
}

/// A parsed `after` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyRef<'a> {
    pub node: Option<&'a str>,
    pub task: &'a str,
}

impl<'a> DependencyRef<'a> {
    pub fn parse(entry: &'a str) -> Self {
        match entry.split_once(':') {
            Some((node, task)) => Self {
                node: Some(node),
                task,
            },
            None => Self {
                node: None,
                task: entry,
            },
        }
    }

    /// The node this entry points at, given the node declaring it.
    pub fn node_or<'b>(&self, own: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.node.unwrap_or(own)
    }
}

/// A fleet file that passed validation.
///
/// Built only through `TryFrom<RawFleetFile>`.
#[derive(Debug, Clone)]
pub struct FleetFile {
    process: ProcessSection,
    concurrency: BTreeMap<String, usize>,
    nodes: Vec<NodeConfig>,
}

impl FleetFile {
    pub(crate) fn new_unchecked(raw: RawFleetFile) -> Self {
        Self {
            process: raw.process,
            concurrency: raw.concurrency,
            nodes: raw.nodes,
        }
    }

    pub fn process(&self) -> &ProcessSection {
        &self.process
    }

    pub fn concurrency(&self) -> &BTreeMap<String, usize> {
        &self.concurrency
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    pub fn task_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tasks.len()).sum()
    }
}
