//! CLI integration tests

use std::process::Command;

fn usagectl(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "usage-cli", "--"])
        .args(args)
        .env_remove("DATABASE_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = usagectl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("usage classifier"), "Should show app name");
    for command in ["train", "stats", "inspect", "predict", "status"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = usagectl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("usagectl"), "Should show binary name");
}

#[test]
fn test_train_help() {
    let output = usagectl(&["train", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in ["--output", "--window-days", "--test-fraction", "--seed", "--dry-run"] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

#[test]
fn test_predict_help() {
    let output = usagectl(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in ["--power-kw", "--nil", "--daily-sessions", "--duration-min", "--energy-kwh"] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

#[test]
fn test_format_option() {
    let output = usagectl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--api-url"));
}

#[test]
fn test_invalid_command() {
    let output = usagectl(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

#[test]
fn test_train_without_database_fails() {
    let output = usagectl(&["train", "--dry-run"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("DATABASE_URL"), "stderr was: {}", stderr);
}

#[test]
fn test_inspect_missing_artifact_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    let output = usagectl(&["inspect", path.to_str().unwrap()]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("not found"), "stderr was: {}", stderr);
}
