// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{FleetFile, RawFleetFile};
use crate::errors::Result;

/// Read and deserialize a fleet file.
///
/// Only TOML deserialization happens here; use [`load_and_validate`] to get
/// a checked [`FleetFile`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawFleetFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let raw: RawFleetFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), nodes = raw.nodes.len(), "fleet file loaded");
    Ok(raw)
}

/// Parse a fleet file from a string and validate it.
pub fn parse_and_validate(contents: &str) -> Result<FleetFile> {
    let raw: RawFleetFile = toml::from_str(contents)?;
    FleetFile::try_from(raw)
}

/// Read a fleet file and validate it.
///
/// Checks node and task names, `after` references and concurrency limits.
/// Loops in the task graph are left to the process pre-flight check.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<FleetFile> {
    let raw = load_from_path(&path)?;
    FleetFile::try_from(raw)
}

/// `Fleet.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Fleet.toml")
}
