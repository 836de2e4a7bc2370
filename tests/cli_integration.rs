//! CLI integration tests
//!
//! These drive the built binary and cover argument handling and exit codes
//! for paths that never reach a model or the network.

mod support;

use serial_test::serial;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use support::fixture_path;
use tempfile::TempDir;

fn abxplan_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_abxplan"))
}

fn run(args: &[&str]) -> Output {
    Command::new(abxplan_bin())
        .args(args)
        .env_remove("ABXPLAN_PROVIDER")
        .env_remove("ABXPLAN_MODEL")
        .env_remove("PERPLEXITY_API_KEY")
        .output()
        .expect("Failed to run abxplan")
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("--log-level"));
}

#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_help_lists_options() {
    let output = run(&["run", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--input", "--sources", "--output", "--save-search", "--provider", "--model", "--no-enrich"] {
        assert!(stdout.contains(flag), "missing {}", flag);
    }
}

#[test]
fn test_missing_input_argument_is_usage_error() {
    let output = run(&["run"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
#[serial]
fn test_unreadable_input_file_exits_2() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let output = run(&["-q", "run", "--input", missing.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.json"));
}

#[test]
#[serial]
fn test_malformed_input_exits_2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");
    fs::write(&path, "[1, 2, 3]").unwrap();

    let output = run(&["-q", "run", "--input", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
#[serial]
fn test_unknown_provider_exits_2() {
    let input = fixture_path("params/mrsa_bacteremia.json");
    let sources = fixture_path("search/mrsa_sources.json");
    let output = run(&[
        "-q",
        "run",
        "--input",
        input.to_str().unwrap(),
        "--sources",
        sources.to_str().unwrap(),
        "--provider",
        "not-a-provider",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-provider"));
}

#[test]
#[serial]
fn test_missing_search_key_without_sources_exits_2() {
    let input = fixture_path("params/mrsa_bacteremia.json");
    let output = run(&["-q", "run", "--input", input.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PERPLEXITY_API_KEY"));
}
