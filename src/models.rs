//! Core Data Models
//!
//! This module defines the data structures that flow through the analytics
//! engine, from untyped source records to the report handed to dashboards.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`RawRecordSet`] - one fetched snapshot, every field optional
//! 2. **Normalized**: [`UserProfile`], [`Application`], [`Goal`], [`UsageEvent`] -
//!    strictly typed records produced by [`crate::normalizer`]
//! 3. **Derived**: [`DerivedMetric`], [`GrowthPoint`], [`Segment`], [`PlatformInsights`]
//! 4. **Report**: [`AnalyticsReport`] - everything derived from one refresh cycle
//!
//! Raw records deliberately keep dates and ids as [`serde_json::Value`] so that a
//! single malformed field never rejects the whole record. All derived types
//! serialize with camelCase keys to match what the dashboard front end reads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecordSet {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub applications: Vec<ApplicationRecord>,
    #[serde(default)]
    pub goals: Vec<GoalRecord>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl RawRecordSet {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.applications.is_empty()
            && self.goals.is_empty()
            && self.events.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<Value>,
    #[serde(default, rename = "lastSignInAt", alias = "last_sign_in_at")]
    pub last_sign_in_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub company: Option<Value>,
    #[serde(default)]
    pub position: Option<Value>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub completed: Option<Value>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, rename = "userId", alias = "user_id")]
    pub user_id: Option<Value>,
    #[serde(default, rename = "type", alias = "event_type")]
    pub event_type: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, rename = "sessionDurationMs", alias = "session_duration_ms")]
    pub session_duration_ms: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    /// Interview, Offer and Accepted count toward the success rate
    pub fn is_success(self) -> bool {
        matches!(self, Self::Interview | Self::Offer | Self::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: String,
    pub user_id: Option<String>,
    pub status: ApplicationStatus,
    pub company: Option<String>,
    pub position: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: Option<String>,
    pub completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub user_id: Option<String>,
    pub event_type: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub session_duration_ms: u64,
}

impl UsageEvent {
    pub fn session_minutes(&self) -> f64 {
        self.session_duration_ms as f64 / 60_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// Metric values are numeric for every built-in calculator, text is kept for
/// dashboard tiles that show labels such as "N/A".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 => write!(f, "{:.0}", n),
            Self::Number(n) => write!(f, "{:.2}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetric {
    pub id: String,
    pub name: String,
    pub value: MetricValue,
    pub change_percent: f64,
    pub trend: Trend,
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub contributing_user_count: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub total_users: usize,
    pub active_users: usize,
    pub new_users: usize,
    pub total_applications: usize,
    pub applications_per_user: f64,
    pub avg_session_time: f64,
    pub retention_percent: f64,
}

impl GrowthPoint {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_users: 0,
            active_users: 0,
            new_users: 0,
            total_applications: 0,
            applications_per_user: 0.0,
            avg_session_time: 0.0,
            retention_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub name: String,
    pub member_count: usize,
    pub percent_of_total: f64,
    pub growth_percent: f64,
    pub avg_applications_per_member: f64,
    pub avg_session_time: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInsights {
    pub churn_rate_percent: f64,
    pub lifetime_value_estimate: f64,
    pub monthly_growth_rate_percent: f64,
    pub feature_adoption_percent: f64,
}

/// Dashboard time range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl TimeRange {
    pub fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            7 => Some(Self::Week),
            30 => Some(Self::Month),
            90 => Some(Self::Quarter),
            365 => Some(Self::Year),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::Year => "365d",
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::Month
    }
}

/// Which computation path produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsMode {
    Local,
    Platform,
}

impl fmt::Display for AnalyticsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Platform => f.write_str("platform"),
        }
    }
}

/// Everything derived from one refresh cycle. Replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub mode: AnalyticsMode,
    pub time_range: TimeRange,
    pub generated_at: DateTime<Utc>,
    pub metrics: Vec<DerivedMetric>,
    pub growth_series: Vec<GrowthPoint>,
    pub segments: Vec<Segment>,
    pub insights: PlatformInsights,
}

impl AnalyticsReport {
    pub fn metric(&self, id: &str) -> Option<&DerivedMetric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }
}
