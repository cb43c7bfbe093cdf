mod common;

use chrono::Utc;
use common::{sample_fixture, CountingSource};
use jobtrack_analytics::export::ExportDocument;
use jobtrack_analytics::mode::AuthState;
use jobtrack_analytics::models::{RawRecordSet, TimeRange};
use jobtrack_analytics::refresh::{RefreshCoordinator, RefreshSettings, RefreshState};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn coordinator(platform: Arc<CountingSource>) -> RefreshCoordinator {
    RefreshCoordinator::new(
        platform,
        Arc::new(CountingSource::new(RawRecordSet::default())),
        AuthState::signed_in("alice", None),
        RefreshSettings {
            time_range: TimeRange::Quarter,
            ..RefreshSettings::default()
        },
    )
}

#[tokio::test]
async fn test_exported_metrics_reparse_bit_for_bit() {
    let platform = Arc::new(CountingSource::new(sample_fixture(Utc::now()).build()));
    let coordinator = coordinator(platform);
    let report = coordinator.request_refresh().await.unwrap();

    let dir = tempdir().unwrap();
    let path = ExportDocument::capture(&coordinator)
        .write_to_file(dir.path(), true)
        .unwrap();
    let restored = ExportDocument::from_json(&fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(restored.metrics.len(), report.metrics.len());
    for (original, reparsed) in report.metrics.iter().zip(&restored.metrics) {
        let a = original.value.as_f64().unwrap();
        let b = reparsed.value.as_f64().unwrap();
        assert_eq!(a.to_bits(), b.to_bits(), "{} changed", original.id);
        assert_eq!(original.change_percent.to_bits(), reparsed.change_percent.to_bits());
    }
    assert_eq!(restored.growth_series, report.growth_series);
    assert_eq!(restored.segments, report.segments);
    assert_eq!(restored.insights, report.insights);
    assert_eq!(restored.time_range, TimeRange::Quarter);
    assert_eq!(restored.refresh_status.refresh_status, RefreshState::Success);
}

#[tokio::test]
async fn test_export_after_failure_records_error_status() {
    let platform = Arc::new(CountingSource::new(RawRecordSet::default()));
    platform.set_failing(true);
    let coordinator = coordinator(platform);
    let _ = coordinator.request_refresh().await;

    let document = ExportDocument::capture(&coordinator);
    assert!(document.mode.is_none());
    assert!(document.metrics.is_empty());
    assert_eq!(document.refresh_status.refresh_status, RefreshState::Error);
    assert_eq!(document.refresh_status.refresh_errors.len(), 1);

    let json: serde_json::Value = serde_json::from_str(&document.to_json(false).unwrap()).unwrap();
    assert_eq!(json["refreshStatus"]["refreshErrors"].as_array().unwrap().len(), 1);
    assert_eq!(json["timeRange"], "90d");
}

#[test]
fn test_export_to_explicit_file_creates_parents() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("nested").join("snapshot.json");
    let document = ExportDocument::from_parts(
        None,
        TimeRange::Week,
        jobtrack_analytics::RefreshStatus::new(300),
        Utc::now(),
    );

    let written = document.write_to_file(&target, false).unwrap();
    assert_eq!(written, target);
    assert!(target.exists());
}
