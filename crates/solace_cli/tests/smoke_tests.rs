//! CLI smoke tests: basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_solace"));
    cmd.env_remove("SOLACE_DB_PATH");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--message"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("solace"), "Expected binary name in --version output");
}

#[test]
fn test_one_shot_crisis_message_prints_resources() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("smoke.db");
    let output = cli_bin()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("--db")
        .arg(&db)
        .arg("--message")
        .arg("I want to kill myself")
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("988"));
    assert!(db.exists());
}

#[test]
fn test_one_shot_everyday_message() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = cli_bin()
        .arg("--db")
        .arg(dir.path().join("smoke.db"))
        .arg("--message")
        .arg("My wife Sarah and I had a great day")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("good to hear"));
    assert!(!stdout.contains("988"));
}
