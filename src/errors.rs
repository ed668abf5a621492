// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The first five variants are contract violations raised by the scheduling
//! core. None of them are retried: they signal a wiring or construction
//! defect the caller must fix. A task *failing* is not an error; it flows
//! through the status model and ends up in the run outcome.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("No such task: {0}")]
    NoSuchTask(String),

    #[error("Loop detected in task graph: {}", path.join(" -> "))]
    LoopDetected {
        /// Tasks on the DFS path when the loop closed, ending with the task
        /// that was reached twice.
        path: Vec<String>,
    },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FleetError>;
