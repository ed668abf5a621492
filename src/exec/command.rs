// src/exec/command.rs

//! Shell command executor.
//!
//! Each task may carry a `cmd` string in its data. Dispatch spawns it with
//! `sh -c` (`cmd /C` on Windows) on the tokio runtime; the exit status comes
//! back through a oneshot channel that `poll` checks without blocking. A
//! task without `cmd` succeeds on the next poll.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::dag::TaskId;
use crate::errors::Result;
use crate::exec::backend::{NodeContext, NodeExecutor};
use crate::types::TaskStatus;

/// Work started by the last dispatch.
#[derive(Debug)]
enum InFlight {
    /// Nothing to run; complete with this status.
    Immediate(TaskStatus),
    /// A child process; dropping `_cancel` kills it.
    Spawned {
        done: oneshot::Receiver<TaskStatus>,
        _cancel: oneshot::Sender<()>,
    },
}

/// Runs task commands as child processes, one at a time per node.
#[derive(Debug)]
pub struct CommandExecutor {
    handle: Handle,
    in_flight: Option<InFlight>,
}

impl CommandExecutor {
    /// An executor spawning onto the runtime behind `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            in_flight: None,
        }
    }

    /// An executor on the runtime of the calling thread.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }
}

impl NodeExecutor for CommandExecutor {
    fn dispatch(&mut self, node: &mut NodeContext<'_>, task: TaskId) -> Result<()> {
        node.begin(task)?;

        let (name, cmd, cwd) = match node.task(task) {
            Some(t) => {
                let data = t.data();
                let field = |key: &str| {
                    data.and_then(|d| d.get(key))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                };
                (t.name().to_string(), field("cmd"), field("cwd"))
            }
            None => (task.to_string(), None, None),
        };

        let Some(cmd) = cmd else {
            debug!(node = %node.name(), task = %name, "task has no command");
            self.in_flight = Some(InFlight::Immediate(TaskStatus::Successful));
            return Ok(());
        };

        let (done_tx, done_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let label = format!("{}/{}", node.name(), name);
        self.handle
            .spawn(run_command(label, cmd, cwd, done_tx, cancel_rx));
        self.in_flight = Some(InFlight::Spawned {
            done: done_rx,
            _cancel: cancel_tx,
        });
        Ok(())
    }

    fn poll(&mut self, node: &mut NodeContext<'_>) -> Result<()> {
        let status = match self.in_flight.take() {
            None => return Ok(()),
            Some(InFlight::Immediate(status)) => status,
            Some(InFlight::Spawned { mut done, _cancel }) => match done.try_recv() {
                Ok(status) => status,
                Err(TryRecvError::Empty) => {
                    self.in_flight = Some(InFlight::Spawned { done, _cancel });
                    return Ok(());
                }
                Err(TryRecvError::Closed) => {
                    warn!(node = %node.name(), "task process vanished without a status");
                    TaskStatus::Failed
                }
            },
        };
        node.complete(status)
    }
}

async fn run_command(
    label: String,
    cmd: String,
    cwd: Option<String>,
    done: oneshot::Sender<TaskStatus>,
    cancel: oneshot::Receiver<()>,
) {
    let status = match run_command_inner(&label, &cmd, cwd.as_deref(), cancel).await {
        Ok(Some(status)) => status,
        Ok(None) => return,
        Err(err) => {
            error!(task = %label, error = %err, "task execution error");
            TaskStatus::Failed
        }
    };
    let _ = done.send(status);
}

/// `None` when the run was cancelled.
async fn run_command_inner(
    label: &str,
    cmd: &str,
    cwd: Option<&str>,
    cancel: oneshot::Receiver<()>,
) -> anyhow::Result<Option<TaskStatus>> {
    info!(task = %label, cmd = %cmd, "starting task process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{label}'"))?;

    if let Some(stderr) = child.stderr.take() {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(task = %label, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        exit = child.wait() => {
            let exit = exit.with_context(|| format!("waiting for process of task '{label}'"))?;
            info!(
                task = %label,
                exit_code = exit.code().unwrap_or(-1),
                success = exit.success(),
                "task process exited"
            );
            Ok(Some(if exit.success() {
                TaskStatus::Successful
            } else {
                TaskStatus::Failed
            }))
        }
        _ = cancel => {
            info!(task = %label, "executor dropped; killing task process");
            if let Err(e) = child.kill().await {
                warn!(task = %label, error = %e, "failed to kill task process");
            }
            Ok(None)
        }
    }
}
