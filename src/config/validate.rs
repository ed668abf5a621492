// src/config/validate.rs

use std::collections::{HashMap, HashSet};

use crate::config::model::{FleetFile, RawFleetFile};
use crate::errors::{FleetError, Result};
use crate::types::TaskStatus;

impl TryFrom<RawFleetFile> for FleetFile {
    type Error = FleetError;

    fn try_from(raw: RawFleetFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_fleet(&raw)?;
        Ok(FleetFile::new_unchecked(raw))
    }
}

/// Check a raw fleet file without consuming it.
pub fn validate_raw_fleet(cfg: &RawFleetFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_node_names(cfg)?;
    validate_concurrency(cfg)?;
    validate_tasks(cfg)?;
    validate_dependencies(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawFleetFile) -> Result<()> {
    if cfg.nodes.is_empty() {
        return Err(FleetError::ConfigError(
            "fleet file must contain at least one [[node]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_names(cfg: &RawFleetFile) -> Result<()> {
    let mut seen = HashSet::new();
    for node in &cfg.nodes {
        if node.name.is_empty() {
            return Err(FleetError::ConfigError(
                "node name must not be empty".to_string(),
            ));
        }
        if node.name.contains(':') {
            return Err(FleetError::ConfigError(format!(
                "node name '{}' must not contain ':'",
                node.name
            )));
        }
        if !seen.insert(node.name.as_str()) {
            return Err(FleetError::ConfigError(format!(
                "duplicate node name '{}'",
                node.name
            )));
        }
    }
    Ok(())
}

fn validate_concurrency(cfg: &RawFleetFile) -> Result<()> {
    for (name, maximum) in &cfg.concurrency {
        if *maximum == 0 {
            return Err(FleetError::ConfigError(format!(
                "[concurrency].{name} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawFleetFile) -> Result<()> {
    for node in &cfg.nodes {
        let mut seen = HashSet::new();
        for task in &node.tasks {
            if task.name.is_empty() {
                return Err(FleetError::ConfigError(format!(
                    "node '{}' has a task with an empty name",
                    node.name
                )));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(FleetError::ConfigError(format!(
                    "node '{}' has duplicate task '{}'",
                    node.name, task.name
                )));
            }
            if task.status == Some(TaskStatus::Running) {
                return Err(FleetError::ConfigError(format!(
                    "task '{}:{}' cannot start as running",
                    node.name, task.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawFleetFile) -> Result<()> {
    let tasks_by_node: HashMap<&str, HashSet<&str>> = cfg
        .nodes
        .iter()
        .map(|n| {
            (
                n.name.as_str(),
                n.tasks.iter().map(|t| t.name.as_str()).collect(),
            )
        })
        .collect();

    for node in &cfg.nodes {
        for task in &node.tasks {
            for dep in task.dependencies() {
                let target = dep.node_or(&node.name);
                let known = tasks_by_node
                    .get(target)
                    .is_some_and(|names| names.contains(dep.task));
                if !known {
                    return Err(FleetError::ConfigError(format!(
                        "task '{}:{}' has unknown dependency '{}:{}' in `after`",
                        node.name, task.name, target, dep.task
                    )));
                }
                if target == node.name && dep.task == task.name {
                    return Err(FleetError::ConfigError(format!(
                        "task '{}:{}' cannot depend on itself in `after`",
                        node.name, task.name
                    )));
                }
            }
        }
    }
    Ok(())
}
