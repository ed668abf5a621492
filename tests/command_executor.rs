// tests/command_executor.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, task_id};

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use fleetdag::config::parse_and_validate;
use fleetdag::drive;
use fleetdag::engine::{FailureReason, RunOutcome};
use fleetdag::exec::CommandExecutor;

const FLEET: &str = r#"
[[node]]
name = "a"

[[node.task]]
name = "ok"
cmd = "true"

[[node.task]]
name = "no-command"
after = ["ok"]

[[node]]
name = "b"

[[node.task]]
name = "bad"
cmd = "exit 3"

[[node.task]]
name = "never"
cmd = "true"
after = ["bad"]
"#;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_shell_commands_and_reports_exit_status() {
    init_tracing();
    let fleet = parse_and_validate(FLEET).unwrap();
    let process = fleet
        .build_process(|_| CommandExecutor::current())
        .unwrap();

    let (process, outcome) = tokio::task::spawn_blocking(move || {
        let stop = AtomicBool::new(false);
        drive(process, Duration::from_millis(5), &stop)
    })
    .await
    .unwrap();

    assert_eq!(
        outcome.unwrap(),
        Some(RunOutcome::Failed(FailureReason::NodesFailed(vec![
            "b".to_string()
        ])))
    );
    let ok = task_id(&process, "a", "ok");
    let no_command = task_id(&process, "a", "no-command");
    let bad = task_id(&process, "b", "bad");
    let never = task_id(&process, "b", "never");
    assert!(process.task(ok).unwrap().successful());
    assert!(process.task(no_command).unwrap().successful());
    assert!(process.task(bad).unwrap().status() == fleetdag::types::TaskStatus::Failed);
    assert!(process.task(never).unwrap().pending());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn raised_interrupt_stops_before_the_next_tick() {
    let fleet = parse_and_validate(FLEET).unwrap();
    let process = fleet
        .build_process(|_| CommandExecutor::current())
        .unwrap();

    let (process, outcome) = tokio::task::spawn_blocking(move || {
        let stop = AtomicBool::new(true);
        drive(process, Duration::from_millis(5), &stop)
    })
    .await
    .unwrap();

    assert_eq!(outcome.unwrap(), None);
    assert_eq!(process.tasks_pending_count(), 4);
}
