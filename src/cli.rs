// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `fleetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "fleetdag",
    version,
    about = "Run dependent tasks across a fleet of nodes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the fleet file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Fleet.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLEETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the fleet, print the task order, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the task graph in Graphviz DOT format to this file.
    ///
    /// Written after the run, or right away with `--dry-run`.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<String>,

    /// Limit the `--dot` output to the tasks of one node.
    #[arg(long, value_name = "NODE", requires = "dot")]
    pub dot_node: Option<String>,

    /// Pause between ticks, overriding `[process].tick_interval_ms`.
    #[arg(long, value_name = "MS")]
    pub tick_interval_ms: Option<u64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
