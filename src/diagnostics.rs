// src/diagnostics.rs

//! Read-only views of a process for operators: Graphviz export, the
//! topological order and one-line summaries.

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::dag::{NodeId, TaskId};
use crate::engine::Process;
use crate::errors::{FleetError, Result};
use crate::types::TaskStatus;

/// Task labels as nodes; edges carry an empty label.
pub type TaskGraph = DiGraph<String, &'static str>;

/// Fill colour of a task in the DOT output.
pub fn status_colour(process: &Process, task: TaskId) -> &'static str {
    let Some(t) = process.task(task) else {
        return "gray";
    };
    match t.status() {
        TaskStatus::Running => "lightblue",
        TaskStatus::Successful => "green",
        TaskStatus::Failed => "red",
        TaskStatus::Skipped => "purple",
        TaskStatus::Pending if process.dependencies_have_failed(task).unwrap_or(false) => "orange",
        TaskStatus::Pending if process.task_ready(task).unwrap_or(false) => "yellow",
        TaskStatus::Pending => "white",
    }
}

/// Every task of the fleet as a petgraph graph, edges pointing from a
/// dependency to its dependent.
pub fn task_graph(process: &Process) -> TaskGraph {
    build_graph(process, None).0
}

/// Tasks of `only` (or of every node), with the fill colour of each graph
/// node at the same index.
fn build_graph(process: &Process, only: Option<NodeId>) -> (TaskGraph, Vec<&'static str>) {
    let mut graph = DiGraph::new();
    let mut colours = Vec::new();
    let mut index: HashMap<TaskId, NodeIndex> = HashMap::new();

    let shown = |task: &TaskId| {
        only.is_none_or(|node| process.task(*task).is_some_and(|t| t.node() == node))
    };

    for task in process.each_task().filter(shown) {
        index.insert(task, graph.add_node(process.task_label(task)));
        colours.push(status_colour(process, task));
    }
    for task in process.each_task().filter(shown) {
        let Some(t) = process.task(task) else {
            continue;
        };
        for dependent in t.forward_dependencies() {
            // Dependents removed from their graph or filtered out are not drawn.
            if let (Some(&from), Some(&to)) = (index.get(&task), index.get(&dependent)) {
                graph.update_edge(from, to, "");
            }
        }
    }
    (graph, colours)
}

fn render(graph: &TaskGraph, colours: &[&'static str]) -> String {
    format!(
        "{}",
        Dot::with_attr_getters(
            graph,
            &[Config::EdgeNoLabel],
            &|_, _| String::new(),
            &|_, (index, _)| {
                let colour = colours.get(index.index()).copied().unwrap_or("gray");
                format!("style=filled, fillcolor={colour}")
            },
        )
    )
}

/// Render the fleet in Graphviz DOT, tasks coloured by status.
pub fn to_dot(process: &Process) -> String {
    let (graph, colours) = build_graph(process, None);
    render(&graph, &colours)
}

/// Render only the tasks of one node and the edges between them.
pub fn node_to_dot(process: &Process, node: NodeId) -> Result<String> {
    if process.node(node).is_none() {
        return Err(FleetError::InvalidArgument(format!(
            "there is no node {node} in {process}"
        )));
    }
    let (graph, colours) = build_graph(process, Some(node));
    Ok(render(&graph, &colours))
}

/// Task labels in dependency order.
pub fn topology_labels(process: &Process) -> Result<Vec<String>> {
    Ok(process
        .topology_sort()?
        .into_iter()
        .map(|task| process.task_label(task))
        .collect())
}

/// One line of task counts.
pub fn summary(process: &Process) -> String {
    format!(
        "{}: {} tasks, {} successful, {} failed, {} running, {} pending",
        process,
        process.tasks_total_count(),
        process.tasks_successful_count(),
        process.tasks_failed_count(),
        process.tasks_running_count(),
        process.tasks_pending_count(),
    )
}
