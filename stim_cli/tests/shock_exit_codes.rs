use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// 20 pulses at 50 Hz keep the burst busy for ~400 ms.
fn write_burst_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[shock]
burst_freq = 50.0
pulse_amp_ma = 1.5
burst_n = 20
pulse_dur_ms = 2
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
fn device_failure_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = write_burst_config(&dir);

    let mut cmd = Command::cargo_bin("stimctl").unwrap();
    cmd.env("STIM_TEST_FAIL_PULSE", "2");
    cmd.arg("--config").arg(&cfg).arg("shock");
    cmd.assert().code(4).stderr(predicate::str::contains(
        "What happened: Pulse 3 of the burst could not be sent",
    ));
}

#[rstest]
fn cancel_after_ms_stops_burst_early() {
    let dir = tempdir().unwrap();
    let cfg = write_burst_config(&dir);

    let mut cmd = Command::cargo_bin("stimctl").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["shock", "--cancel-after-ms", "50"]);
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("of 20 pulses"));
}

#[rstest]
fn json_error_carries_reason_and_details() {
    let dir = tempdir().unwrap();
    let cfg = write_burst_config(&dir);

    let out = Command::cargo_bin("stimctl")
        .unwrap()
        .env("STIM_TEST_FAIL_PULSE", "0")
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("shock")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(4));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(v["reason"], "DeviceCommand");
    assert_eq!(v["details"]["pulse"], 1);
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}

#[rstest]
fn json_burst_report_on_success() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[shock]\nburst_n = 3\n").unwrap();

    let out = Command::cargo_bin("stimctl")
        .unwrap()
        .arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("shock")
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    assert_eq!(v["burst"]["pulses"], 3);
    // three 18 ms holds at the default 50 Hz
    assert!(v["burst"]["elapsed_ms"].as_u64().unwrap() >= 50);
}
