//! CLI integration tests
//!
//! Drives the coxswain binary with assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn coxswain() -> Command {
    Command::cargo_bin("coxswain").expect("coxswain binary not built")
}

#[test]
fn test_cli_help() {
    coxswain()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("coxswain"))
        .stdout(predicate::str::contains("Remote session conductor"));
}

#[test]
fn test_cli_version() {
    coxswain().arg("--version").assert().success();
}

#[test]
fn test_inspect_missing_file_fails() {
    coxswain()
        .args(["inspect", "/nonexistent/session.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read session file"));
}

#[test]
fn test_inspect_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();

    coxswain()
        .args(["inspect", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to decode session file"));
}

#[test]
fn test_replay_emits_launch_write() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // An empty transcript still shows the conductor's opening write.
    writeln!(file, "[]").unwrap();

    coxswain()
        .args(["replay", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("write \"getshell\\n\""))
        .stdout(predicate::str::contains("final state: will-execute"));
}

#[test]
fn test_replay_recovery_transcript() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let transcript = serde_json::json!([
        {"event": "recovery_line", "text": ":begin-recovery"},
        {"event": "recovery_line", "text": ":recovery: login 9999"},
        {"event": "recovery_line", "text": ":recovery: dcsID abc"},
        {"event": "recovery_line", "text": ":recovery: sshargs u@h"},
        {"event": "recovery_line", "text": ":recovery: boolArgs "},
        {"event": "recovery_line", "text": ":recovery: clientUniqueID x"},
        {"event": "recovery_line", "text": ":end-recovery"},
    ]);
    write!(file, "{}", transcript).unwrap();

    coxswain()
        .args(["replay", file.path().to_str().unwrap(), "--no-start"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "recovered pid=9999 dcs_id=abc client_unique_id=x",
        ));
}
