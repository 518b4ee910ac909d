//! Integration tests for CLI argument handling
//!
//! Runs the built binary for parsing-level checks that need no network
//! access or API key.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_skycast"))
        .args(args)
        .output()
        .expect("Failed to execute skycast")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skycast"), "Help should mention skycast");
    assert!(stdout.contains("current"), "Help should list the current command");
    assert!(stdout.contains("watch"), "Help should list the watch command");
}

#[test]
fn test_unknown_subcommand_fails() {
    let output = run_cli(&["tides"]);
    assert!(!output.status.success(), "Unknown subcommand should fail");
}

#[test]
fn test_watch_without_cities_fails() {
    let output = run_cli(&["watch"]);
    assert!(
        !output.status.success(),
        "watch requires at least one city"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("CITIES") || stderr.contains("cities") || stderr.contains("required"),
        "Should mention the missing argument: {}",
        stderr
    );
}

#[test]
fn test_coords_rejects_non_numeric_arguments() {
    let output = run_cli(&["coords", "north", "west"]);
    assert!(!output.status.success(), "Non-numeric coords should fail");
}
