// src/config/build.rs

//! Building a [`Process`] from a validated fleet file.
//!
//! Tasks are created with `add_new_task` and wired with `add_dependency`
//! only, so a fleet built here goes through the same checks as one built by
//! hand.

use tracing::debug;

use crate::config::model::{FleetFile, NodeConfig};
use crate::dag::TaskRef;
use crate::engine::{Node, Process};
use crate::errors::{FleetError, Result};
use crate::exec::NodeExecutor;

impl FleetFile {
    /// Build the fleet, giving every node the executor `executor` makes for
    /// it.
    pub fn build_process<E, F>(&self, mut executor: F) -> Result<Process>
    where
        E: NodeExecutor + 'static,
        F: FnMut(&NodeConfig) -> E,
    {
        self.build_with(|node, cfg| node.with_executor(executor(cfg)))
    }

    /// Build the fleet without executors, for inspection only.
    ///
    /// Running the result fails with `NotImplemented` on the first poll.
    pub fn build_inert_process(&self) -> Result<Process> {
        self.build_with(|node, _| node)
    }

    fn build_with<F>(&self, mut attach: F) -> Result<Process>
    where
        F: FnMut(Node, &NodeConfig) -> Node,
    {
        let mut process = match &self.process().id {
            Some(id) => Process::with_id(id.clone()),
            None => Process::new(),
        };

        for (name, maximum) in self.concurrency() {
            process.set_maximum_concurrency(name, *maximum);
        }

        let mut node_ids = Vec::with_capacity(self.nodes().len());
        for cfg in self.nodes() {
            let mut node = Node::new(cfg.name.clone())
                .with_id(cfg.id())
                .with_critical(cfg.critical);
            if let Some(status) = cfg.status {
                node.set_status(status);
            }
            node_ids.push(process.add_node(attach(node, cfg))?);
        }

        for (cfg, node) in self.nodes().iter().zip(&node_ids) {
            for task in &cfg.tasks {
                let id = process.add_new_task(*node, task.name.clone(), task.data())?;
                if let Some(status) = task.status {
                    process.set_task_status(id, status)?;
                }
            }
        }

        for (cfg, node) in self.nodes().iter().zip(&node_ids) {
            for task in &cfg.tasks {
                for dep in task.dependencies() {
                    let from = match dep.node {
                        None => TaskRef::Name(dep.task),
                        Some(other) => {
                            let other_id = process.find_node(other).ok_or_else(|| {
                                FleetError::ConfigError(format!("unknown node '{other}'"))
                            })?;
                            let id = process.get_task(other_id, dep.task).ok_or_else(|| {
                                FleetError::NoSuchTask(format!(
                                    "there is no task '{}' on node '{other}'",
                                    dep.task
                                ))
                            })?;
                            TaskRef::Id(id)
                        }
                    };
                    process.add_dependency(*node, from, task.name.as_str())?;
                }
            }
        }

        debug!(
            process = %process,
            nodes = process.nodes().len(),
            tasks = process.tasks_total_count(),
            "process built from fleet file"
        );
        Ok(process)
    }
}
