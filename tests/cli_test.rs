mod common;

use assert_cmd::Command;
use chrono::Utc;
use common::sample_fixture;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn cli(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("jobtrack-analytics").unwrap();
    cmd.current_dir(workdir.path())
        .env("LOG_LEVEL", "error")
        .env("JOBTRACK_LOCAL_DIR", workdir.path().join("no-local-data"))
        .env_remove("RUST_LOG");
    cmd
}

fn data_dir() -> TempDir {
    let dir = tempdir().unwrap();
    sample_fixture(Utc::now()).write_to(dir.path()).unwrap();
    dir
}

#[test]
fn test_report_json_output() {
    let data = data_dir();
    let work = tempdir().unwrap();

    let output = cli(&work)
        .args(["report", "--json", "--range", "7", "--data-dir"])
        .arg(data.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["mode"], "platform");
    assert_eq!(json["report"]["timeRange"], "7d");
    assert_eq!(json["report"]["growthSeries"].as_array().unwrap().len(), 8);
    assert_eq!(json["refreshStatus"]["refreshStatus"], "success");
}

#[test]
fn test_report_offline_uses_local_mode() {
    let data = data_dir();
    let work = tempdir().unwrap();

    cli(&work)
        .args(["report", "--json", "--offline", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"local\""));
}

#[test]
fn test_report_text_output() {
    let data = data_dir();
    let work = tempdir().unwrap();

    cli(&work)
        .env("NO_COLOR", "1")
        .args(["report", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Job Tracker Analytics - Platform (30d)"))
        .stdout(predicate::str::contains("Power Users"));
}

#[test]
fn test_missing_data_dir_fails() {
    let work = tempdir().unwrap();

    cli(&work)
        .args(["report", "--json", "--data-dir"])
        .arg(work.path().join("missing"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\""));
}

#[test]
fn test_unsupported_range_rejected() {
    let data = data_dir();
    let work = tempdir().unwrap();

    cli(&work)
        .args(["report", "--range", "14", "--data-dir"])
        .arg(data.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported range 14"));
}

#[test]
fn test_watch_refuses_when_auto_refresh_disabled() {
    let data = data_dir();
    let work = tempdir().unwrap();

    cli(&work)
        .env("JOBTRACK_AUTO_REFRESH", "false")
        .args(["watch", "--data-dir"])
        .arg(data.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Auto-refresh is disabled"));
}

#[test]
fn test_export_writes_document() {
    let data = data_dir();
    let work = tempdir().unwrap();
    let target = work.path().join("out.json");

    cli(&work)
        .args(["export", "--data-dir"])
        .arg(data.path())
        .arg("--output")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported analytics to"));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
    assert!(json["exportDate"].is_string());
    assert_eq!(json["mode"], "platform");
    assert!(!json["metrics"].as_array().unwrap().is_empty());
}
