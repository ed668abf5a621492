// tests/logging.rs

use fleetdag::cli::LogLevel;
use fleetdag::logging::{LOG_ENV, build_filter};

#[test]
fn cli_level_wins_over_environment() {
    let filter = build_filter(Some(LogLevel::Debug), Some("error")).unwrap();
    assert_eq!(filter.to_string(), "debug");
}

#[test]
fn environment_directives_are_kept() {
    let filter = build_filter(None, Some("info,fleetdag::exec=trace")).unwrap();
    let text = filter.to_string();
    assert!(text.contains("fleetdag::exec=trace"), "{text}");
}

#[test]
fn empty_environment_falls_back_to_info() {
    assert_eq!(build_filter(None, Some("  ")).unwrap().to_string(), "info");
    assert_eq!(build_filter(None, None).unwrap().to_string(), "info");
}

#[test]
fn malformed_environment_is_an_error() {
    let err = build_filter(None, Some("fleetdag=loud")).unwrap_err();
    assert!(err.to_string().contains(LOG_ENV));
}
