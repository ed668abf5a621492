// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{FleetFile, load_and_validate};
use crate::engine::{Process, RunOutcome};
use crate::exec::CommandExecutor;

/// High-level entry point used by `main.rs`.
///
/// Loads the fleet file, builds one [`CommandExecutor`] per node and drives
/// the process on a blocking thread, one tick per interval, until it
/// terminates or Ctrl-C is pressed.
pub async fn run(args: CliArgs) -> Result<RunOutcome> {
    let config_path = PathBuf::from(&args.config);
    let fleet = load_and_validate(&config_path)
        .with_context(|| format!("loading fleet file {}", config_path.display()))?;

    if args.dry_run {
        let process = fleet.build_inert_process()?;
        print_dry_run(&fleet, &process)?;
        write_dot(&args, &process)?;
        return Ok(RunOutcome::Succeeded);
    }

    let handle = Handle::current();
    let process = fleet.build_process(|_| CommandExecutor::new(handle.clone()))?;
    let tick = Duration::from_millis(
        args.tick_interval_ms
            .unwrap_or(fleet.process().tick_interval_ms),
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            flag.store(true, Ordering::SeqCst);
        });
    }

    let (process, outcome) =
        tokio::task::spawn_blocking(move || drive(process, tick, &interrupted))
            .await
            .context("process driver thread panicked")?;

    write_dot(&args, &process)?;
    println!("{}", diagnostics::summary(&process));

    match outcome? {
        Some(outcome) => {
            println!("{outcome}");
            Ok(outcome)
        }
        None => Err(anyhow!("run interrupted")),
    }
}

/// Tick `process` until it terminates; `None` if `interrupted` was raised
/// first.
///
/// The process is handed back so the caller can report on its final state.
pub fn drive(
    mut process: Process,
    tick: Duration,
    interrupted: &AtomicBool,
) -> (Process, errors::Result<Option<RunOutcome>>) {
    let result = drive_inner(&mut process, tick, interrupted);
    (process, result)
}

fn drive_inner(
    process: &mut Process,
    tick: Duration,
    interrupted: &AtomicBool,
) -> errors::Result<Option<RunOutcome>> {
    let order = process.topology_sort()?;
    info!(
        process = %process,
        tasks = order.len(),
        tick_ms = tick.as_millis() as u64,
        "starting run"
    );

    loop {
        if let Some(outcome) = process.check_termination() {
            info!(process = %process, outcome = %outcome, "run finished");
            return Ok(Some(outcome));
        }
        if interrupted.load(Ordering::SeqCst) {
            warn!(process = %process, "interrupted; stopping");
            return Ok(None);
        }

        let dispatched = process.process_all_nodes()?;
        if !dispatched.is_empty() {
            debug!(count = dispatched.len(), "tasks dispatched this tick");
        }
        std::thread::sleep(tick);
    }
}

fn write_dot(args: &CliArgs, process: &Process) -> Result<()> {
    let Some(path) = args.dot.as_deref() else {
        return Ok(());
    };
    let dot = match args.dot_node.as_deref() {
        Some(name) => {
            let node = process
                .find_node(name)
                .ok_or_else(|| anyhow!("--dot-node: no node named '{name}'"))?;
            diagnostics::node_to_dot(process, node)?
        }
        None => diagnostics::to_dot(process),
    };
    fs::write(path, dot).with_context(|| format!("writing DOT graph to {path}"))?;
    info!(path = %path, "task graph written");
    Ok(())
}

/// Print nodes, tasks and the dependency order; fails on a loop.
fn print_dry_run(fleet: &FleetFile, process: &Process) -> Result<()> {
    println!("fleetdag dry-run");
    if let Some(id) = &fleet.process().id {
        println!("  process.id = {id}");
    }
    println!("  process.tick_interval_ms = {}", fleet.process().tick_interval_ms);
    for (name, maximum) in fleet.concurrency() {
        println!("  concurrency.{name} = {maximum}");
    }
    println!();

    println!("nodes ({}):", fleet.nodes().len());
    for node in fleet.nodes() {
        let critical = if node.critical { " (critical)" } else { "" };
        println!("  - {} [{}]{critical}", node.name, node.id());
        for task in &node.tasks {
            println!("      {}", task.name);
            if let Some(cmd) = task.cmd() {
                println!("        cmd: {cmd}");
            }
            if !task.after.is_empty() {
                println!("        after: {:?}", task.after);
            }
        }
    }
    println!();

    let order = diagnostics::topology_labels(process)?;
    println!("order ({}):", order.len());
    for (i, label) in order.iter().enumerate() {
        println!("  {:>3}. {label}", i + 1);
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
