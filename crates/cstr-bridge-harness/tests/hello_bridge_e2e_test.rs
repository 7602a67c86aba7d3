//! End-to-end test: the `hello-bridge` binary.
//!
//! Validates that:
//! 1. With no arguments stdout is exactly the 11 bytes `hello world`.
//! 2. Repeated runs produce identical writes and nothing else on stdout.
//! 3. Structured logs and reports go to files, never stdout.
//! 4. The write-status policy decides whether a failed write is fatal.
//! 5. A refused native allocation exits 1 without writing.
//! 6. Unknown `--status` values are rejected as usage errors.
//!
//! Run: cargo test -p cstr-bridge-harness --test hello_bridge_e2e_test

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use cstr_bridge_harness::structured_log::validate_log_file;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hello-bridge"));
    cmd.env_remove("CSTR_BRIDGE_STATUS")
        .env_remove("CSTR_BRIDGE_LOG");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("spawn hello-bridge")
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "cstr-bridge-{}-{name}",
        std::process::id()
    ))
}

#[test]
fn default_invocation_prints_hello_world_exactly() {
    let out = run(&mut bin());

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, b"hello world");
    assert_eq!(out.stdout.len(), 11);
    assert!(out.stderr.is_empty());
}

#[test]
fn invocations_are_independent() {
    let first = run(&mut bin());
    let second = run(&mut bin());
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(first.status.code(), Some(0));
    assert_eq!(second.status.code(), Some(0));
}

#[test]
fn repeat_writes_identical_copies() {
    let out = run(bin().args(["--repeat", "3"]));

    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello worldhello worldhello world");
}

#[test]
fn empty_text_writes_nothing() {
    let out = run(bin().args(["--text", ""]));

    assert!(out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn log_and_report_stay_off_stdout() {
    let log = scratch_path("run.jsonl");
    let report = scratch_path("report.json");

    let out = run(bin()
        .arg("--repeat")
        .arg("2")
        .arg("--log")
        .arg(&log)
        .arg("--report")
        .arg(&report));

    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello worldhello world");

    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "log errors: {errors:?}");
    // start + 3 steps per run + end
    assert_eq!(lines, 1 + 3 * 2 + 1);

    let body = std::fs::read_to_string(&report).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["policy"], "permissive");
    assert_eq!(parsed["text_len"], 11);
    assert_eq!(parsed["runs"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["runs"][1]["buffer_len"], 12);
    assert_eq!(parsed["runs"][1]["live_after"], 0);
    assert_eq!(parsed["allocated_total"], parsed["released_total"]);

    let _ = std::fs::remove_file(log);
    let _ = std::fs::remove_file(report);
}

#[test]
fn log_path_can_come_from_environment() {
    let log = scratch_path("env.jsonl");

    let out = run(bin().env("CSTR_BRIDGE_LOG", &log));

    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello world");
    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "log errors: {errors:?}");
    assert_eq!(lines, 5);

    let _ = std::fs::remove_file(log);
}

#[test]
fn refused_allocation_exits_one_without_output() {
    let out = run(bin().args(["--max-native-bytes", "4"]));

    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("native allocation of 12 bytes failed"),
        "stderr: {stderr}"
    );
}

#[test]
fn allocation_limit_that_fits_still_prints() {
    let out = run(bin().args(["--max-native-bytes", "12", "--repeat", "2"]));

    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello worldhello world");
}

#[test]
fn unknown_status_value_is_a_usage_error() {
    let out = run(bin().args(["--status", "chekced"]));

    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid value"), "stderr: {stderr}");
}

#[test]
fn status_aliases_are_accepted() {
    for value in ["strict", "check", "ignore", "off", "permissive"] {
        let out = run(bin().args(["--status", value]));
        assert!(out.status.success(), "--status {value}");
        assert_eq!(out.stdout, b"hello world");
    }
}

#[cfg(target_os = "linux")]
fn dev_full() -> Stdio {
    std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/full")
        .expect("open /dev/full")
        .into()
}

#[cfg(target_os = "linux")]
#[test]
fn permissive_policy_ignores_failed_write() {
    let status = bin()
        .stdout(dev_full())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
}

#[cfg(target_os = "linux")]
#[test]
fn checked_policy_fails_on_failed_write() {
    let out = bin()
        .args(["--status", "checked"])
        .stdout(dev_full())
        .stderr(Stdio::piped())
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("native stream write failed"), "stderr: {stderr}");
}

#[cfg(target_os = "linux")]
#[test]
fn strict_alias_selects_checked_policy() {
    let status = bin()
        .args(["--status", "strict"])
        .stdout(dev_full())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[cfg(target_os = "linux")]
#[test]
fn checked_policy_can_come_from_environment() {
    let status = bin()
        .env("CSTR_BRIDGE_STATUS", "checked")
        .stdout(dev_full())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!status.success());
}
