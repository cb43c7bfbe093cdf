//! Export serializer
//!
//! Snapshots the coordinator's cached report plus its refresh status into a
//! single JSON document. Floats are written with shortest round-trip
//! formatting, so re-reading an export reproduces every metric bit-for-bit.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{AnalyticsMode, AnalyticsReport, DerivedMetric, GrowthPoint, PlatformInsights, Segment, TimeRange};
use crate::refresh::{RefreshCoordinator, RefreshStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: DateTime<Utc>,
    pub time_range: TimeRange,
    /// `None` when nothing has been computed yet
    pub mode: Option<AnalyticsMode>,
    pub metrics: Vec<DerivedMetric>,
    pub growth_series: Vec<GrowthPoint>,
    pub segments: Vec<Segment>,
    pub insights: PlatformInsights,
    pub refresh_status: RefreshStatus,
}

impl ExportDocument {
    /// Snapshot whatever the coordinator currently caches. Never triggers a
    /// refresh.
    pub fn capture(coordinator: &RefreshCoordinator) -> Self {
        let report = coordinator.latest();
        let time_range = report
            .as_ref()
            .map(|r| r.time_range)
            .unwrap_or_else(|| coordinator.time_range());
        Self::from_parts(report.as_deref(), time_range, coordinator.status(), Utc::now())
    }

    pub fn from_parts(
        report: Option<&AnalyticsReport>,
        time_range: TimeRange,
        refresh_status: RefreshStatus,
        export_date: DateTime<Utc>,
    ) -> Self {
        match report {
            Some(report) => Self {
                export_date,
                time_range,
                mode: Some(report.mode),
                metrics: report.metrics.clone(),
                growth_series: report.growth_series.clone(),
                segments: report.segments.clone(),
                insights: report.insights.clone(),
                refresh_status,
            },
            None => Self {
                export_date,
                time_range,
                mode: None,
                metrics: Vec::new(),
                growth_series: Vec::new(),
                segments: Vec::new(),
                insights: PlatformInsights::default(),
                refresh_status,
            },
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.context("Failed to serialize export document")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse export document")
    }

    /// `job-tracker-analytics-YYYY-MM-DD.json`
    pub fn default_file_name(date: NaiveDate) -> String {
        format!("job-tracker-analytics-{}.json", date.format("%Y-%m-%d"))
    }

    /// Write into `target`. A directory gets the default file name appended.
    pub fn write_to_file(&self, target: &Path, pretty: bool) -> Result<PathBuf> {
        let path = if target.is_dir() {
            target.join(Self::default_file_name(self.export_date.date_naive()))
        } else {
            target.to_path_buf()
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create export directory: {}", parent.display()))?;
        }

        fs::write(&path, self.to_json(pretty)?)
            .with_context(|| format!("Failed to write export file: {}", path.display()))?;

        info!(path = %path.display(), metrics = self.metrics.len(), "Analytics exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricValue, Trend};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn report() -> AnalyticsReport {
        AnalyticsReport {
            mode: AnalyticsMode::Platform,
            time_range: TimeRange::Week,
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            metrics: vec![DerivedMetric {
                id: "success_rate".to_string(),
                name: "Success Rate".to_string(),
                value: MetricValue::Number(1.0 / 3.0 * 100.0),
                change_percent: -0.1 - 0.2,
                trend: Trend::Down,
                period: "7d".to_string(),
                target: Some(25.0),
                unit: Some("%".to_string()),
                contributing_user_count: 3,
                description: "Offers and acceptances over all applications".to_string(),
            }],
            growth_series: vec![GrowthPoint::empty(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())],
            segments: Vec::new(),
            insights: PlatformInsights::default(),
        }
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let doc = ExportDocument::from_parts(Some(&report()), TimeRange::Week, RefreshStatus::new(300), Utc::now());
        let restored = ExportDocument::from_json(&doc.to_json(false).unwrap()).unwrap();

        let original = doc.metrics[0].value.as_f64().unwrap();
        let reparsed = restored.metrics[0].value.as_f64().unwrap();
        assert_eq!(original.to_bits(), reparsed.to_bits());
        assert_eq!(doc.metrics[0].change_percent.to_bits(), restored.metrics[0].change_percent.to_bits());
        assert_eq!(restored, doc);
    }

    #[test]
    fn test_empty_capture_has_no_mode() {
        let doc = ExportDocument::from_parts(None, TimeRange::Month, RefreshStatus::new(60), Utc::now());
        let json: serde_json::Value = serde_json::from_str(&doc.to_json(true).unwrap()).unwrap();
        assert!(json["mode"].is_null());
        assert_eq!(json["timeRange"], "30d");
        assert!(json["exportDate"].is_string());
        assert_eq!(json["refreshStatus"]["refreshStatus"], "idle");
    }

    #[test]
    fn test_write_into_directory_uses_default_name() {
        let dir = tempdir().unwrap();
        let date = Utc.with_ymd_and_hms(2024, 5, 9, 8, 0, 0).unwrap();
        let doc = ExportDocument::from_parts(Some(&report()), TimeRange::Week, RefreshStatus::new(300), date);

        let path = doc.write_to_file(dir.path(), true).unwrap();
        assert_eq!(path.file_name().unwrap(), "job-tracker-analytics-2024-05-09.json");
        assert!(path.exists());
    }
}
