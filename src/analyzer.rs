//! Analysis Engine
//!
//! This module runs the synchronous half of a refresh cycle: it takes one
//! fetched [`RawRecordSet`] and produces a complete [`AnalyticsReport`].
//!
//! ## Pipeline
//!
//! 1. **Normalization**: [`RecordNormalizer`] turns raw records into typed ones
//!    and builds the per-user index
//! 2. **Mode preparation**: the [`ComputationPath`] folds records into a single
//!    local user when running in local mode
//! 3. **Metrics**: every calculator in [`crate::metrics::CALCULATORS`]
//! 4. **Growth series**: [`build_growth_series`] over the selected range
//! 5. **Segments**: [`build_segments`]
//! 6. **Insights**: [`platform_insights`]
//!
//! The analyzer holds no state and performs no I/O, so the coordinator can run
//! it on a blocking thread without any locking.
//!
//! ## Usage Example
//!
//! ```rust
//! use chrono::Utc;
//! use jobtrack_analytics::analyzer::DashboardAnalyzer;
//! use jobtrack_analytics::mode::ComputationPath;
//! use jobtrack_analytics::models::{RawRecordSet, TimeRange};
//!
//! let analyzer = DashboardAnalyzer::new(TimeRange::Week);
//! let report = analyzer.analyze(RawRecordSet::default(), &ComputationPath::Platform, Utc::now());
//! assert_eq!(report.growth_series.len(), 8);
//! ```

use crate::metrics::{compute_all, platform_insights, MetricContext};
use crate::mode::ComputationPath;
use crate::models::*;
use crate::normalizer::RecordNormalizer;
use crate::segments::build_segments;
use crate::timeseries::build_growth_series;
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardAnalyzer {
    time_range: TimeRange,
}

impl DashboardAnalyzer {
    pub fn new(time_range: TimeRange) -> Self {
        Self { time_range }
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn analyze(
        &self,
        raw: RawRecordSet,
        path: &ComputationPath,
        now: DateTime<Utc>,
    ) -> AnalyticsReport {
        let snapshot = path.prepare(RecordNormalizer::normalize(raw), now);
        if snapshot.is_empty() {
            debug!(mode = %path.mode(), "No records to analyze, every figure is zero");
        }
        let window_days = self.time_range.days();
        let ctx = MetricContext::new(&snapshot, now, window_days);

        let report = AnalyticsReport {
            mode: path.mode(),
            time_range: self.time_range,
            generated_at: now,
            metrics: compute_all(&ctx),
            growth_series: build_growth_series(&snapshot, now.date_naive(), window_days),
            segments: build_segments(&ctx),
            insights: platform_insights(&ctx),
        };

        debug!(
            mode = %report.mode,
            users = snapshot.users.len(),
            applications = snapshot.applications.len(),
            events = snapshot.events.len(),
            points = report.growth_series.len(),
            "Computed analytics report"
        );

        report
    }
}
