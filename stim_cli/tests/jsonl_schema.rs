use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[display]
refresh_hz = 50.0
width = 64
height = 48
grating_period_px = 8

[centering]
margin_px = 20.0

[simulation]
origin_x = 32.0
origin_y = 24.0
bout_interval_s = 0.1
bout_duration_s = 0.04
bout_distance_px = 4.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn run_json(kind: &str, seconds: &str) -> Vec<serde_json::Value> {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("stimctl")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--kind", kind, "--seconds", seconds, "--fast"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("valid JSON"))
        .collect()
}

/// Every tick line carries frame/elapsed/dt plus the variant's dynamic keys;
/// the final line is the run summary.
#[rstest]
#[case("closed-loop", &["vel", "fish_velocity", "gain"])]
#[case("constant", &["x", "y"])]
#[case("fish-tracking", &["x", "y", "theta"])]
#[case("centering", &["active", "vel", "fish_velocity", "gain"])]
fn jsonl_tick_schema(#[case] kind: &str, #[case] keys: &[&str]) {
    let lines = run_json(kind, "0.2");
    let (summary, ticks) = lines.split_last().unwrap();
    assert!(ticks.len() >= 10, "only {} ticks", ticks.len());

    let mut last_elapsed = -1.0;
    for (i, v) in ticks.iter().enumerate() {
        assert_eq!(v["frame"].as_u64(), Some(i as u64));
        let elapsed = v["elapsed"].as_f64().unwrap();
        assert!(elapsed >= last_elapsed);
        last_elapsed = elapsed;
        assert!(v["dt"].as_f64().is_some());

        let state = v["state"].as_object().unwrap();
        let got: Vec<&str> = state.keys().map(String::as_str).collect();
        assert_eq!(got.len(), keys.len(), "{got:?}");
        for k in keys {
            assert!(state.contains_key(*k), "missing {k} in {got:?}");
        }
    }

    let s = &summary["summary"];
    assert_eq!(s["kind"], kind);
    assert_eq!(s["frames"].as_u64(), Some(ticks.len() as u64));
    assert!(matches!(s["end"].as_str(), Some("finished" | "time_limit")));
    assert!(s["primitives"].as_u64().unwrap() > 0);
}

/// Bouts from the simulated estimator reach the closed-loop velocity.
#[rstest]
fn jsonl_closed_loop_sees_bouts() {
    let lines = run_json("closed-loop", "0.3");
    let ticks = &lines[..lines.len() - 1];
    let swimming = ticks
        .iter()
        .filter(|v| v["state"]["fish_velocity"].as_f64().is_some_and(|f| f < 0.0))
        .count();
    assert!(swimming > 0, "no bout observed");
    assert!(
        ticks
            .iter()
            .any(|v| v["state"]["vel"].as_f64().is_some_and(|vel| vel != 10.0)),
        "velocity never left base_vel"
    );
}
