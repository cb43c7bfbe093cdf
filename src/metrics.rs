//! Metric Calculators
//!
//! Every calculator is a pure function of a [`MetricContext`]: the normalized
//! snapshot, the instant the report is computed at, and the length of the
//! reporting window. The prior period used for change percentages is derived
//! from the same snapshot by looking at it "as of" the start of the window, so
//! no calculator ever needs a second fetch.
//!
//! All outputs are finite. Denominators are guarded with `max(1, d)` and an
//! empty snapshot yields zeros, never NaN or infinity.

use crate::models::*;
use crate::normalizer::{visible_at, NormalizedSnapshot};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Trailing window for "active" users
pub const ACTIVE_WINDOW_DAYS: i64 = 7;
/// A user is "new" for this many days after sign-up
pub const NEW_USER_WINDOW_DAYS: i64 = 30;
/// Inactivity span after which a user counts as churned
pub const CHURN_WINDOW_DAYS: i64 = 30;
/// Estimated value of a single tracked application, in dollars
pub const VALUE_PER_APPLICATION: f64 = 10.0;

const ENGAGEMENT_SESSION_MINUTES_WEIGHT: f64 = 0.3;
const ENGAGEMENT_SESSIONS_WEIGHT: f64 = 0.3;
const ENGAGEMENT_APPLICATIONS_WEIGHT: f64 = 0.4;

const TREND_THRESHOLD: f64 = 0.5;

pub struct MetricContext<'a> {
    pub snapshot: &'a NormalizedSnapshot,
    pub now: DateTime<Utc>,
    pub window_days: u32,
}

impl<'a> MetricContext<'a> {
    pub fn new(snapshot: &'a NormalizedSnapshot, now: DateTime<Utc>, window_days: u32) -> Self {
        Self {
            snapshot,
            now,
            window_days,
        }
    }

    /// Start of the current period, which is also the end of the prior one
    pub fn period_start(&self) -> DateTime<Utc> {
        self.now - Duration::days(i64::from(self.window_days))
    }

    pub fn prior_start(&self) -> DateTime<Utc> {
        self.now - Duration::days(2 * i64::from(self.window_days))
    }

    fn period_label(&self) -> String {
        format!("{}d", self.window_days)
    }

    fn users_at(&self, at: DateTime<Utc>) -> impl Iterator<Item = &'a UserProfile> + '_ {
        self.snapshot
            .users
            .iter()
            .filter(move |u| visible_at(u.created_at, at, self.now))
    }

    fn user_count_at(&self, at: DateTime<Utc>) -> usize {
        self.users_at(at).count()
    }

    fn application_count_at(&self, at: DateTime<Utc>) -> usize {
        self.snapshot
            .applications
            .iter()
            .filter(|a| visible_at(a.created_at, at, self.now))
            .count()
    }

    /// Users created in `(from, to]`
    fn new_users_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.snapshot
            .users
            .iter()
            .filter(|u| u.created_at.map_or(false, |c| c > from && c <= to))
            .count()
    }

    fn applications_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> usize {
        self.snapshot
            .applications
            .iter()
            .filter(|a| a.created_at.map_or(false, |c| c > from && c <= to))
            .count()
    }

    /// Whether `user` signed in or created an application in the trailing
    /// active window ending at `at`
    pub fn is_active_at(&self, user: &UserProfile, at: DateTime<Utc>) -> bool {
        let from = at - Duration::days(ACTIVE_WINDOW_DAYS);
        let in_window = |t: DateTime<Utc>| t >= from && t <= at;

        user.last_sign_in_at.map_or(false, in_window)
            || self
                .snapshot
                .applications_for(&user.id)
                .any(|a| a.created_at.map_or(false, in_window))
    }

    pub fn active_users_at(&self, at: DateTime<Utc>) -> usize {
        self.users_at(at).filter(|u| self.is_active_at(u, at)).count()
    }

    fn users_with_applications(&self) -> usize {
        self.snapshot
            .users
            .iter()
            .filter(|u| self.snapshot.application_count(&u.id) > 0)
            .count()
    }
}

pub fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn round2(value: f64) -> f64 {
    finite((value * 100.0).round() / 100.0)
}

/// `numerator / max(1, denominator) * 100`
pub fn ratio_percent(numerator: usize, denominator: usize) -> f64 {
    round2(numerator as f64 / denominator.max(1) as f64 * 100.0)
}

pub fn percent_change(current: f64, prior: f64) -> f64 {
    let (current, prior) = (finite(current), finite(prior));
    if prior == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round2((current - prior) / prior.abs() * 100.0)
}

pub fn trend_for(change_percent: f64) -> Trend {
    if change_percent > TREND_THRESHOLD {
        Trend::Up
    } else if change_percent < -TREND_THRESHOLD {
        Trend::Down
    } else {
        Trend::Stable
    }
}

struct MetricDraft {
    id: &'static str,
    name: &'static str,
    value: f64,
    change_percent: f64,
    target: Option<f64>,
    unit: Option<&'static str>,
    contributing_user_count: usize,
    description: &'static str,
}

impl MetricDraft {
    fn finish(self, ctx: &MetricContext<'_>) -> DerivedMetric {
        let change_percent = finite(self.change_percent);
        DerivedMetric {
            id: self.id.to_string(),
            name: self.name.to_string(),
            value: MetricValue::Number(finite(self.value)),
            change_percent,
            trend: trend_for(change_percent),
            period: ctx.period_label(),
            target: self.target,
            unit: self.unit.map(str::to_string),
            contributing_user_count: self.contributing_user_count,
            description: self.description.to_string(),
        }
    }
}

pub fn total_users(ctx: &MetricContext<'_>) -> DerivedMetric {
    let total = ctx.snapshot.users.len();
    let at_start = ctx.user_count_at(ctx.period_start());

    MetricDraft {
        id: "total_users",
        name: "Total Users",
        value: total as f64,
        change_percent: percent_change(total as f64, at_start as f64),
        target: None,
        unit: None,
        contributing_user_count: total,
        description: "Registered accounts in the current snapshot",
    }
    .finish(ctx)
}

/// thisPeriodNewUsers / max(1, priorPeriodNewUsers) * 100
pub fn user_growth(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = ctx.new_users_between(ctx.period_start(), ctx.now);
    let prior = ctx.new_users_between(ctx.prior_start(), ctx.period_start());

    MetricDraft {
        id: "user_growth",
        name: "User Growth",
        value: ratio_percent(current, prior),
        change_percent: percent_change(current as f64, prior as f64),
        target: None,
        unit: Some("%"),
        contributing_user_count: current + prior,
        description: "New sign-ups this period relative to the previous period",
    }
    .finish(ctx)
}

pub fn active_users(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = ctx.active_users_at(ctx.now);
    let prior = ctx.active_users_at(ctx.period_start());

    MetricDraft {
        id: "active_users",
        name: "Active Users",
        value: current as f64,
        change_percent: percent_change(current as f64, prior as f64),
        target: None,
        unit: None,
        contributing_user_count: current,
        description: "Users who signed in or applied within the last 7 days",
    }
    .finish(ctx)
}

pub fn total_applications(ctx: &MetricContext<'_>) -> DerivedMetric {
    let total = ctx.snapshot.applications.len();
    let current = ctx.applications_between(ctx.period_start(), ctx.now);
    let prior = ctx.applications_between(ctx.prior_start(), ctx.period_start());

    MetricDraft {
        id: "total_applications",
        name: "Total Applications",
        value: total as f64,
        change_percent: percent_change(current as f64, prior as f64),
        target: None,
        unit: None,
        contributing_user_count: ctx.users_with_applications(),
        description: "Applications tracked across all users",
    }
    .finish(ctx)
}

pub fn applications_per_user(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = applications_per_user_at(ctx, ctx.now);
    let prior = applications_per_user_at(ctx, ctx.period_start());

    MetricDraft {
        id: "applications_per_user",
        name: "Applications per User",
        value: current,
        change_percent: percent_change(current, prior),
        target: None,
        unit: None,
        contributing_user_count: ctx.snapshot.users.len(),
        description: "Average number of applications tracked per user",
    }
    .finish(ctx)
}

fn applications_per_user_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    round2(ctx.application_count_at(at) as f64 / ctx.user_count_at(at).max(1) as f64)
}

pub fn engagement_score(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = engagement_score_at(ctx, ctx.now);
    let prior = engagement_score_at(ctx, ctx.period_start());

    MetricDraft {
        id: "engagement_score",
        name: "Engagement Score",
        value: current,
        change_percent: percent_change(current, prior),
        target: Some(50.0),
        unit: Some("pts"),
        contributing_user_count: ctx.snapshot.users.len(),
        description: "Weighted blend of session length, session frequency and applications per user",
    }
    .finish(ctx)
}

/// round(0.3 * avgSessionMinutes + 0.3 * sessionsPerUser + 0.4 * applicationsPerUser)
pub fn engagement_score_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    let users = ctx.user_count_at(at).max(1) as f64;

    let (mut sessions, mut timed, mut minutes) = (0usize, 0usize, 0.0f64);
    for event in ctx
        .snapshot
        .events
        .iter()
        .filter(|e| visible_at(e.timestamp, at, ctx.now))
    {
        sessions += 1;
        if event.session_duration_ms > 0 {
            timed += 1;
            minutes += event.session_minutes();
        }
    }

    let avg_session_minutes = minutes / timed.max(1) as f64;
    let sessions_per_user = sessions as f64 / users;
    let applications_per_user = ctx.application_count_at(at) as f64 / users;

    finite(
        (ENGAGEMENT_SESSION_MINUTES_WEIGHT * avg_session_minutes
            + ENGAGEMENT_SESSIONS_WEIGHT * sessions_per_user
            + ENGAGEMENT_APPLICATIONS_WEIGHT * applications_per_user)
            .round(),
    )
}

pub fn success_rate(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = success_rate_at(ctx, ctx.now);
    let prior = success_rate_at(ctx, ctx.period_start());

    MetricDraft {
        id: "success_rate",
        name: "Success Rate",
        value: current,
        change_percent: percent_change(current, prior),
        target: Some(20.0),
        unit: Some("%"),
        contributing_user_count: ctx.users_with_applications(),
        description: "Share of applications that reached interview, offer or acceptance",
    }
    .finish(ctx)
}

pub fn success_rate_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    let (mut total, mut successful) = (0usize, 0usize);
    for app in ctx
        .snapshot
        .applications
        .iter()
        .filter(|a| visible_at(a.created_at, at, ctx.now))
    {
        total += 1;
        if app.status.is_success() {
            successful += 1;
        }
    }
    ratio_percent(successful, total)
}

pub fn retention_rate(ctx: &MetricContext<'_>) -> DerivedMetric {
    let (current, cohort) = retention_at(ctx, ctx.now);
    let (prior, _) = retention_at(ctx, ctx.period_start());

    MetricDraft {
        id: "retention_rate",
        name: "Retention Rate",
        value: current,
        change_percent: percent_change(current, prior),
        target: Some(40.0),
        unit: Some("%"),
        contributing_user_count: cohort,
        description: "Users from before this period who are still active",
    }
    .finish(ctx)
}

/// Returns (retention percent, cohort size) for the period ending at `at`
fn retention_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> (f64, usize) {
    let cohort_cutoff = at - Duration::days(i64::from(ctx.window_days));
    let (mut cohort, mut retained) = (0usize, 0usize);

    for user in ctx
        .snapshot
        .users
        .iter()
        .filter(|u| u.created_at.map_or(false, |c| c <= cohort_cutoff))
    {
        cohort += 1;
        if ctx.is_active_at(user, at) {
            retained += 1;
        }
    }

    (ratio_percent(retained, cohort), cohort)
}

pub fn churn_rate(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = churn_rate_at(ctx, ctx.now);
    let prior = churn_rate_at(ctx, ctx.period_start());

    MetricDraft {
        id: "churn_rate",
        name: "Churn Rate",
        value: current,
        change_percent: percent_change(current, prior),
        target: Some(10.0),
        unit: Some("%"),
        contributing_user_count: ctx.snapshot.users.len(),
        description: "Users with no sign-in and no application in the last 30 days",
    }
    .finish(ctx)
}

/// Users whose last activity is older than the churn window (or unknown) and
/// who created no application inside it, over users existing at `at`.
///
/// Last activity is the last sign-in, falling back to account creation when
/// the sign-in is missing or lies after `at`.
pub fn churn_rate_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    let cutoff = at - Duration::days(CHURN_WINDOW_DAYS);
    let (mut total, mut churned) = (0usize, 0usize);

    for user in ctx.users_at(at) {
        total += 1;
        let last_seen = user
            .last_sign_in_at
            .filter(|t| *t <= at)
            .or(user.created_at.filter(|t| *t <= at));
        let stale = last_seen.map_or(true, |t| t < cutoff);
        let applied_recently = ctx
            .snapshot
            .applications_for(&user.id)
            .any(|a| a.created_at.map_or(false, |c| c >= cutoff && c <= at));

        if stale && !applied_recently {
            churned += 1;
        }
    }

    ratio_percent(churned, total)
}

pub fn lifetime_value(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = lifetime_value_at(ctx, ctx.now);
    let prior = lifetime_value_at(ctx, ctx.period_start());

    MetricDraft {
        id: "lifetime_value",
        name: "Lifetime Value (est.)",
        value: current,
        change_percent: percent_change(current, prior),
        target: None,
        unit: Some("$"),
        contributing_user_count: ctx.snapshot.users.len(),
        description: "Estimate only: average applications per user times a fixed per-application value",
    }
    .finish(ctx)
}

pub fn lifetime_value_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    round2(applications_per_user_at(ctx, at) * VALUE_PER_APPLICATION)
}

pub fn feature_adoption(ctx: &MetricContext<'_>) -> DerivedMetric {
    let current = feature_adoption_at(ctx, ctx.now);
    let prior = feature_adoption_at(ctx, ctx.period_start());

    MetricDraft {
        id: "feature_adoption",
        name: "Goal Adoption",
        value: current,
        change_percent: percent_change(current, prior),
        target: Some(60.0),
        unit: Some("%"),
        contributing_user_count: ctx.snapshot.users.len(),
        description: "Users who have set at least one goal",
    }
    .finish(ctx)
}

pub fn feature_adoption_at(ctx: &MetricContext<'_>, at: DateTime<Utc>) -> f64 {
    let goal_owners: HashSet<&str> = ctx
        .snapshot
        .goals
        .iter()
        .filter(|g| visible_at(g.created_at, at, ctx.now))
        .filter_map(|g| g.user_id.as_deref())
        .collect();

    let (mut total, mut adopters) = (0usize, 0usize);
    for user in ctx.users_at(at) {
        total += 1;
        if goal_owners.contains(user.id.as_str()) {
            adopters += 1;
        }
    }
    ratio_percent(adopters, total)
}

/// Percent change of sign-ups in the last 30 days against the 30 days before
pub fn monthly_growth_rate(ctx: &MetricContext<'_>) -> f64 {
    let month = Duration::days(30);
    let current = ctx.new_users_between(ctx.now - month, ctx.now);
    let prior = ctx.new_users_between(ctx.now - month - month, ctx.now - month);
    percent_change(current as f64, prior as f64)
}

pub fn platform_insights(ctx: &MetricContext<'_>) -> PlatformInsights {
    PlatformInsights {
        churn_rate_percent: churn_rate_at(ctx, ctx.now),
        lifetime_value_estimate: lifetime_value_at(ctx, ctx.now),
        monthly_growth_rate_percent: monthly_growth_rate(ctx),
        feature_adoption_percent: feature_adoption_at(ctx, ctx.now),
    }
}

pub type Calculator = fn(&MetricContext<'_>) -> DerivedMetric;

/// Dashboard order
pub const CALCULATORS: &[Calculator] = &[
    total_users,
    user_growth,
    active_users,
    total_applications,
    applications_per_user,
    engagement_score,
    success_rate,
    retention_rate,
    churn_rate,
    lifetime_value,
    feature_adoption,
];

pub fn compute_all(ctx: &MetricContext<'_>) -> Vec<DerivedMetric> {
    CALCULATORS.iter().map(|calculate| calculate(ctx)).collect()
}
