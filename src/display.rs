//! Output Formatting and Display Management
//!
//! Renders an [`AnalyticsReport`] either as a colored terminal summary or as
//! structured JSON for programmatic consumption.
//!
//! ## Terminal layout
//!
//! - Header with mode and time range
//! - One line per derived metric, colored by trend
//! - User segments with member counts and growth
//! - Platform insights
//! - The last few growth-series points
//! - Refresh status line
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use jobtrack_analytics::display::DisplayManager;
//! # fn show(report: &jobtrack_analytics::AnalyticsReport, status: &jobtrack_analytics::refresh::RefreshStatus) {
//! DisplayManager::new().display_report(report, status, false);
//! # }
//! ```

use crate::models::*;
use crate::refresh::{RefreshState, RefreshStatus};
use colored::{ColoredString, Colorize};

/// Growth points shown in the terminal summary
const SERIES_TAIL: usize = 7;

pub struct DisplayManager;

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self
    }

    pub fn display_report(&self, report: &AnalyticsReport, status: &RefreshStatus, json_output: bool) {
        if json_output {
            let output = serde_json::json!({
                "report": report,
                "refreshStatus": status,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing report to JSON: {}", e),
            }
            return;
        }

        println!("\n{}", "=".repeat(80).bright_cyan());
        println!(
            "{}",
            format!(
                "Job Tracker Analytics - {} ({})",
                mode_label(report.mode),
                report.time_range.label()
            )
            .bright_white()
            .bold()
        );
        println!("{}", "=".repeat(80).bright_cyan());

        println!("\n{} Metrics:", "📊".bright_yellow());
        for metric in &report.metrics {
            let unit = metric.unit.as_deref().unwrap_or("");
            println!(
                "   {:<28} {} {}",
                metric.name.bright_white(),
                format!("{}{}", metric.value, unit).bright_green().bold(),
                trend_badge(metric.trend, metric.change_percent)
            );
        }

        println!("\n{} Segments:", "👥".bright_blue());
        for segment in &report.segments {
            println!(
                "   {:<18} {} members ({:.1}%), growth {}, {:.2} apps/member",
                segment.name.bright_cyan(),
                segment.member_count.to_string().bright_white().bold(),
                segment.percent_of_total,
                signed_percent(segment.growth_percent),
                segment.avg_applications_per_member
            );
        }

        let insights = &report.insights;
        println!("\n{} Insights:", "💡".bright_yellow());
        println!("   Churn rate:        {}", format!("{:.2}%", insights.churn_rate_percent).bright_white());
        println!("   Lifetime value:    {}", format!("${:.2}", insights.lifetime_value_estimate).bright_green());
        println!("   Monthly growth:    {}", signed_percent(insights.monthly_growth_rate_percent));
        println!("   Feature adoption:  {}", format!("{:.2}%", insights.feature_adoption_percent).bright_white());

        let skip = report.growth_series.len().saturating_sub(SERIES_TAIL);
        println!("\n{} Growth (last {} days):", "📅".bright_blue(), report.growth_series.len() - skip);
        for point in report.growth_series.iter().skip(skip) {
            println!(
                "   {}: {} users, {} active, {} new, {} applications",
                point.date.to_string().bright_white().bold(),
                point.total_users,
                point.active_users,
                point.new_users,
                point.total_applications
            );
        }

        println!();
        self.display_status(status);
    }

    pub fn display_status(&self, status: &RefreshStatus) {
        println!("{}", status_line(status));
        for error in &status.refresh_errors {
            println!("   {} {}", "✗".bright_red(), error.red());
        }
    }
}

/// One-line refresh summary, also used by `watch`
pub fn status_line(status: &RefreshStatus) -> String {
    let state = if status.is_refreshing {
        "refreshing".bright_yellow()
    } else {
        match status.refresh_status {
            RefreshState::Idle => "idle".normal(),
            RefreshState::Success => "ok".bright_green(),
            RefreshState::Error => "error".bright_red(),
        }
    };

    let last = status
        .last_refresh_timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let auto = if status.auto_refresh_enabled {
        format!("every {}s", status.auto_refresh_interval_seconds)
    } else {
        "off".to_string()
    };

    format!(
        "{} refresh {} • last {} • auto {} • {} errors",
        "🔄".bright_blue(),
        state,
        last,
        auto,
        status.refresh_errors.len()
    )
}

fn mode_label(mode: AnalyticsMode) -> &'static str {
    match mode {
        AnalyticsMode::Local => "Local",
        AnalyticsMode::Platform => "Platform",
    }
}

fn trend_badge(trend: Trend, change_percent: f64) -> ColoredString {
    let text = format!("({:+.1}%)", change_percent);
    match trend {
        Trend::Up => format!("▲ {}", text).bright_green(),
        Trend::Down => format!("▼ {}", text).bright_red(),
        Trend::Stable => format!("● {}", text).bright_black(),
    }
}

fn signed_percent(value: f64) -> ColoredString {
    let text = format!("{:+.1}%", value);
    if value > 0.0 {
        text.bright_green()
    } else if value < 0.0 {
        text.bright_red()
    } else {
        text.normal()
    }
}
