// src/dag/topology.rs

//! Whole-fleet topological ordering and loop detection.
//!
//! Depth-first search over forward edges with three colours: tasks not yet
//! seen, tasks on the current path, and permanently visited tasks. A task is
//! prepended to the ordering once all of its forward dependents are done, so
//! the result lists dependencies before dependents. Meeting a task that is
//! still on the current path means the graph has a loop.
//!
//! The walk uses an explicit stack, so long chains do not exhaust the thread
//! stack.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::dag::task::{TaskArena, TaskId};
use crate::errors::{FleetError, Result};

/// Order every task reachable from `roots` (dependencies first).
///
/// `label` renders a task for the loop path carried by
/// [`FleetError::LoopDetected`].
pub fn topology_sort<I, L>(tasks: &TaskArena, roots: I, label: L) -> Result<Vec<TaskId>>
where
    I: IntoIterator<Item = TaskId>,
    L: Fn(TaskId) -> String,
{
    let mut permanent: HashSet<TaskId> = HashSet::new();
    let mut ordering: VecDeque<TaskId> = VecDeque::new();

    for root in roots {
        if permanent.contains(&root) {
            continue;
        }
        if !tasks.contains(root) {
            return Err(FleetError::InvalidArgument(format!(
                "{root} is not a task of this process"
            )));
        }

        // (task, index of the next forward dependency to visit)
        let mut stack: Vec<(TaskId, usize)> = vec![(root, 0)];
        let mut on_path: HashSet<TaskId> = HashSet::from([root]);

        while let Some((current, cursor)) = stack.last_mut() {
            let current = *current;
            match tasks.at(current).forward_dependency_at(*cursor) {
                Some(next) => {
                    *cursor += 1;
                    if permanent.contains(&next) {
                        continue;
                    }
                    if on_path.contains(&next) {
                        let start = stack.iter().position(|(t, _)| *t == next).unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|(t, _)| label(*t)).collect();
                        path.push(label(next));
                        warn!(path = ?path, "loop detected in task graph");
                        return Err(FleetError::LoopDetected { path });
                    }
                    on_path.insert(next);
                    stack.push((next, 0));
                }
                None => {
                    stack.pop();
                    on_path.remove(&current);
                    permanent.insert(current);
                    ordering.push_front(current);
                }
            }
        }
    }

    debug!(tasks = ordering.len(), "topology sort complete");
    Ok(ordering.into())
}
