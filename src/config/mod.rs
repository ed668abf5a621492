// src/config/mod.rs

//! Fleet file loading and validation.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a fleet file from disk.
//! - [`validate`] turns a raw file into a checked [`FleetFile`].
//! - [`build`] creates a [`Process`](crate::engine::Process) from it.

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{DependencyRef, FleetFile, NodeConfig, ProcessSection, RawFleetFile, TaskConfig};
pub use validate::validate_raw_fleet;
