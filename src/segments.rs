//! Segmentation Engine
//!
//! Partitions users into the four dashboard cohorts. Each predicate is
//! evaluated on its own, so a user who is both active and a power user is
//! counted in both segments; percentages are not expected to sum to 100.
//!
//! Segment growth compares membership at `now` with membership at the start of
//! the reporting window, evaluated against the same snapshot.

use crate::metrics::{
    percent_change, ratio_percent, round2, MetricContext, NEW_USER_WINDOW_DAYS,
};
use crate::models::{Segment, UserProfile};
use crate::normalizer::visible_at;
use chrono::{DateTime, Duration, Utc};

/// Application count at which a user becomes a power user
pub const POWER_USER_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Active,
    New,
    Power,
    Returning,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 4] = [Self::Active, Self::New, Self::Power, Self::Returning];

    pub fn name(self) -> &'static str {
        match self {
            Self::Active => "Active Users",
            Self::New => "New Users",
            Self::Power => "Power Users",
            Self::Returning => "Returning Users",
        }
    }

    /// Membership of `user` as of instant `at`
    pub fn matches(self, ctx: &MetricContext<'_>, user: &UserProfile, at: DateTime<Utc>) -> bool {
        match self {
            Self::Active => ctx.is_active_at(user, at),
            Self::New => is_new(user, at),
            Self::Power => applications_at(ctx, user, at) >= POWER_USER_THRESHOLD,
            Self::Returning => !is_new(user, at) && applications_at(ctx, user, at) >= 1,
        }
    }
}

fn is_new(user: &UserProfile, at: DateTime<Utc>) -> bool {
    let from = at - Duration::days(NEW_USER_WINDOW_DAYS);
    user.created_at.map_or(false, |c| c >= from && c <= at)
}

fn applications_at(ctx: &MetricContext<'_>, user: &UserProfile, at: DateTime<Utc>) -> usize {
    ctx.snapshot
        .applications_for(&user.id)
        .filter(|a| visible_at(a.created_at, at, ctx.now))
        .count()
}

pub fn members<'a>(
    ctx: &'a MetricContext<'a>,
    kind: SegmentKind,
    at: DateTime<Utc>,
) -> impl Iterator<Item = &'a UserProfile> + 'a {
    ctx.snapshot
        .users
        .iter()
        .filter(move |u| visible_at(u.created_at, at, ctx.now))
        .filter(move |u| kind.matches(ctx, u, at))
}

pub fn build_segment(ctx: &MetricContext<'_>, kind: SegmentKind) -> Segment {
    let total_users = ctx.snapshot.users.len();

    let (mut member_count, mut applications, mut timed, mut minutes) = (0usize, 0usize, 0usize, 0.0f64);
    for user in members(ctx, kind, ctx.now) {
        member_count += 1;
        applications += ctx.snapshot.application_count(&user.id);
        for event in ctx
            .snapshot
            .events_for(&user.id)
            .filter(|e| e.session_duration_ms > 0)
        {
            timed += 1;
            minutes += event.session_minutes();
        }
    }

    let prior_count = members(ctx, kind, ctx.period_start()).count();

    Segment {
        name: kind.name().to_string(),
        member_count,
        percent_of_total: ratio_percent(member_count, total_users),
        growth_percent: percent_change(member_count as f64, prior_count as f64),
        avg_applications_per_member: round2(applications as f64 / member_count.max(1) as f64),
        avg_session_time: round2(minutes / timed.max(1) as f64),
    }
}

pub fn build_segments(ctx: &MetricContext<'_>) -> Vec<Segment> {
    SegmentKind::ALL
        .iter()
        .map(|kind| build_segment(ctx, *kind))
        .collect()
}
