#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub use fleetdag_test_utils::{FakeRecorder, ProcessBuilder, init_tracing, task_id};

/// Write `contents` to a temporary fleet file.
pub fn fleet_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}
