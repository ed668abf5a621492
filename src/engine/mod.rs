// src/engine/mod.rs

//! Orchestration engine for fleetdag.
//!
//! - [`node`] holds one node: its graph, status and executor.
//! - [`process`] owns the fleet and implements the run loop.
//! - [`outcome`] describes how a run ended.

pub mod node;
pub mod outcome;
pub mod process;

pub use node::Node;
pub use outcome::{FailureReason, RunOutcome};
pub use process::Process;
