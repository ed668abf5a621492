// src/dag/mod.rs

//! Task model and dependency graph.
//!
//! - [`task`] holds the task records, their mirrored dependency edges and
//!   the memoized readiness logic.
//! - [`graph`] is the per-node collection of tasks with its aggregate
//!   queries.
//! - [`concurrency`] tracks fleet-wide running counts per task name.
//! - [`topology`] orders all tasks of a fleet and detects loops.

pub mod concurrency;
pub mod graph;
pub mod task;
pub mod topology;

pub use concurrency::ConcurrencyRegistry;
pub use graph::{Graph, TaskRef};
pub use task::{NodeId, Task, TaskArena, TaskData, TaskId};
pub use topology::topology_sort;
