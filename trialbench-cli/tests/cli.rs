#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn trialbench(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_trialbench"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn write_manifest(dir: &TempDir, manifest: Value) -> String {
    let path = dir.path().join("manifest.json");
    std::fs::write(&path, manifest.to_string()).unwrap();
    path.to_str().unwrap().to_string()
}

fn command_manifest(dir: &TempDir) -> String {
    write_manifest(
        dir,
        json!({
            "ok": { "description": "Does nothing", "cmdargs": ["-c", "true"] },
            "broken": { "cmdargs": ["-c", "exit 3"] }
        }),
    )
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    trialbench(dir.path()).arg("--help").assert().success();
    trialbench(dir.path())
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--manifest"));
}

#[test]
fn test_run_successful_benchmark() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    trialbench(dir.path())
        .args(["run", "-C", "no", "-R", "10", "-M", &manifest, "-X", "/bin/sh", "ok"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Running suite of 1 benchmarks ..."))
        .stdout(predicate::str::contains("Does nothing"))
        .stdout(predicate::str::contains("     1 successful completions"))
        .stdout(predicate::str::contains("     0 hard failures"));
}

#[test]
fn test_failure_sets_exit_status() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    trialbench(dir.path())
        .args(["run", "-C", "no", "-R", "10", "-M", &manifest, "-X", "/bin/sh"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "error: broken: Command exited with error code 3 instead of 0",
        ))
        .stdout(predicate::str::contains("     1 hard failures"));
}

#[test]
fn test_unknown_benchmark() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    trialbench(dir.path())
        .args(["run", "-C", "no", "-M", &manifest, "-X", "/bin/sh", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "error: nope: No definition for this benchmark in the manifest file",
        ));
}

#[test]
fn test_invalid_manifest() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, json!({ "a": { "frobnicate": true } }));
    trialbench(dir.path())
        .args(["run", "-C", "no", "-M", &manifest, "-X", "/bin/sh"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid manifest file"));
}

#[test]
fn test_alert_without_history_warns() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    trialbench(dir.path())
        .args(["run", "-C", "no", "-R", "10", "-A", "2", "-M", &manifest, "-X", "/bin/sh", "ok"])
        .assert()
        .code(0)
        .stderr(predicate::str::contains(
            "warning: --alert has no effect without --history",
        ))
        .stdout(predicate::str::contains("regression alerts").not());
}

#[test]
fn test_history_round_trip() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    let history = dir.path().join("history.json");
    let history = history.to_str().unwrap();

    for _ in 0..2 {
        trialbench(dir.path())
            .args(["run", "-C", "no", "-R", "10", "-A", "1000", "-H", history])
            .args(["-M", &manifest, "-X", "/bin/sh", "ok"])
            .assert()
            .code(0)
            .stdout(predicate::str::contains(
                "regression alerts (threshold was 1000.00 sigma)",
            ));
    }

    trialbench(dir.path())
        .args(["history", "-H", history, "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok").and(predicate::str::contains("Does nothing")));

    trialbench(dir.path())
        .args(["history", "-H", history, "--export", "ok"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# No. of Data-Points:   2"));

    trialbench(dir.path())
        .args(["history", "-H", history, "--drop", "ok"])
        .assert()
        .success();
    trialbench(dir.path())
        .args(["history", "-H", history, "--export", "ok"])
        .assert()
        .code(1);
}

#[test]
fn test_no_update_leaves_history_alone() {
    let dir = TempDir::new().unwrap();
    let manifest = command_manifest(&dir);
    let history = dir.path().join("history.json");
    trialbench(dir.path())
        .args(["run", "-C", "no", "-R", "10", "-N", "-H", history.to_str().unwrap()])
        .args(["-M", &manifest, "-X", "/bin/sh", "ok"])
        .assert()
        .code(0);
    assert!(!history.exists());
}

#[test]
fn test_history_requires_database() {
    let dir = TempDir::new().unwrap();
    trialbench(dir.path())
        .args(["history", "-H", "missing.json", "--list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Database does not exist"));
}

#[test]
fn test_self_timed_json_report() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        json!({
            "micro": { "description": "Reports itself", "command": ["/bin/sh", "-c", "echo 2.5e-7 1e-8 1000"] }
        }),
    );
    let output = trialbench(dir.path())
        .args(["run", "--self-timed", "-C", "no", "--format", "json", "-M", &manifest])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let result = &report["results"][0];
    assert_eq!(result["id"], "micro");
    assert_eq!(result["status"], "passed");
    assert_eq!(result["metrics"]["samples"], 1000);
    assert_eq!(result["metrics"]["mean_s"], 2.5e-7);
    assert_eq!(report["summary"]["failure_count"], 0);
}

#[test]
fn test_timeout_is_reported() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        json!({ "slow": { "cmdargs": ["-c", "sleep 5"] } }),
    );
    trialbench(dir.path())
        .args(["run", "-C", "no", "-T", "300ms", "-M", &manifest, "-X", "/bin/sh"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error: slow: Timeout (0.30 s) expired"));
}

#[test]
fn test_init_writes_config() {
    let dir = TempDir::new().unwrap();
    trialbench(dir.path()).arg("init").assert().success();
    assert!(dir.path().join("trialbench.toml").exists());
    trialbench(dir.path()).arg("init").assert().code(1);
}

#[test]
fn test_sigint_cancels_run() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        json!({
            "a": { "cmdargs": ["-c", "touch started; sleep 30"] },
            "b": { "cmdargs": ["-c", "touch b-ran"] }
        }),
    );
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_trialbench"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["run", "-C", "no", "-o", "report.json", "-M", &manifest, "-X", "/bin/sh"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let began = Instant::now();
    while !dir.path().join("started").exists() {
        assert!(began.elapsed() < Duration::from_secs(10), "first trial never started");
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGINT) }, 0);

    let output = child.wait_with_output().unwrap();
    assert!(began.elapsed() < Duration::from_secs(20));
    assert_eq!(output.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Canceled by keyboard interrupt"), "{stderr}");
    assert!(!dir.path().join("b-ran").exists());

    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
            .unwrap();
    assert_eq!(report["results"][0]["id"], "a");
    assert_eq!(report["results"][0]["status"], "failed");
    assert_eq!(report["results"][1]["id"], "b");
    assert_eq!(report["results"][1]["status"], "skipped");
}
