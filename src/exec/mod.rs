// src/exec/mod.rs

//! Execution layer.
//!
//! The scheduling core reaches execution only through [`NodeExecutor`].
//!
//! - [`backend`] defines that trait and the [`NodeContext`] an executor
//!   works through.
//! - [`command`] is the production executor, running each task's `cmd`
//!   with `tokio::process::Command`.

pub mod backend;
pub mod command;

pub use backend::{NodeContext, NodeExecutor};
pub use command::CommandExecutor;
