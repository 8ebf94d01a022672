//! CLI Integration Tests
//!
//! These tests run the `nearby` binary. The watch test uses `--demo`, so no
//! Bluetooth adapter is needed.
//!
//! ```
//! cargo test --package nearby-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

/// Run the nearby binary with an isolated environment.
fn run_nearby(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nearby"))
        .args(args)
        .env_remove("NEARBY_CONFIG")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run nearby binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_config(dir: &Path, content: &str) -> String {
    let path = dir.join("config.toml");
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help() {
    let output = run_nearby(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("watch"));
    assert!(text.contains("config"));
    assert!(text.contains("parse-payload"));
}

#[test]
fn test_version() {
    let output = run_nearby(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// Parse Payload Tests
// =============================================================================

#[test]
fn test_parse_payload_text() {
    let output = run_nearby(&["parse-payload", "42,Ada Lovelace"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("User ID:   42"));
    assert!(text.contains("User name: Ada Lovelace"));
}

#[test]
fn test_parse_payload_json() {
    let output = run_nearby(&["parse-payload", "7,Kay", "--format", "json"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["user_id"], 7);
    assert_eq!(value["user_name"], "Kay");
}

#[test]
fn test_parse_payload_rejects_malformed() {
    for payload in ["42", "a,b", "1,2,3"] {
        let output = run_nearby(&["parse-payload", payload]);
        assert!(!output.status.success(), "accepted {:?}", payload);
        assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid identity payload"));
    }
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_init_and_validate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nearby").join("config.toml");
    let path = path.to_string_lossy().into_owned();

    let output = run_nearby(&["--config", &path, "config", "init"]);
    assert!(output.status.success());
    let output = run_nearby(&["--config", &path, "config", "validate"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("is valid"));

    let output = run_nearby(&["--config", &path, "config", "show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("report_interval_ms = 1000"));
}

#[test]
fn test_config_validate_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
            [scanner]
            max_samples = 0

            [[roster]]
            user_id = 1
            identity_key = "nope"
        "#,
    );

    let output = run_nearby(&["--config", &path, "config", "validate"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scanner.max_samples"));
    assert!(stderr.contains("roster[0].identity_key"));
}

#[test]
fn test_config_path_from_env() {
    let output = Command::new(env!("CARGO_BIN_EXE_nearby"))
        .args(["config", "path"])
        .env("NEARBY_CONFIG", "/tmp/custom-nearby.toml")
        .output()
        .expect("Failed to run nearby binary");
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "/tmp/custom-nearby.toml");
}

// =============================================================================
// Watch Tests
// =============================================================================

#[test]
fn test_watch_demo_reports_nearby_peer() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
            [scanner]
            report_interval_ms = 200
            connect_poll_interval_ms = 500
            rescan_interval_ms = 2000
        "#,
    );

    let output = run_nearby(&[
        "--config", &path, "--quiet", "watch", "--demo", "--count", "15", "--format", "json",
    ]);
    assert!(output.status.success());

    let reports: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(reports.len(), 15);

    // Early reports can run on short windows; the last one has full windows.
    let last: Vec<&str> = reports[14]["immediate"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["user_name"].as_str())
        .collect();
    assert_eq!(last, vec!["Ada"], "last report: {}", reports[14]);
}
