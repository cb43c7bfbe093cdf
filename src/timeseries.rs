//! Day-bucketed growth series.
//!
//! [`build_growth_series`] always returns `window_days + 1` points, one per UTC
//! calendar day from `today - window_days` through `today`, so callers can index
//! by offset without checking for gaps. Days with no data hold zeros.
//!
//! Cumulative fields (`totalUsers`, `totalApplications`) count dated records
//! created on or before the day. Records with unreadable dates are not placed
//! on any day.

use crate::metrics::{ratio_percent, round2, ACTIVE_WINDOW_DAYS};
use crate::models::GrowthPoint;
use crate::normalizer::NormalizedSnapshot;
use chrono::{Days, NaiveDate};
use std::collections::HashMap;

struct UserTimeline {
    created: Option<NaiveDate>,
    /// Sign-in and application dates, sorted
    activity: Vec<NaiveDate>,
}

impl UserTimeline {
    /// Active on `day` if any activity falls within `[day - 7, day]`
    fn active_on(&self, day: NaiveDate) -> bool {
        let from = days_before(day, ACTIVE_WINDOW_DAYS as u64);
        let first = self.activity.partition_point(|d| *d < from);
        self.activity.get(first).map_or(false, |d| *d <= day)
    }
}

fn days_before(day: NaiveDate, n: u64) -> NaiveDate {
    day.checked_sub_days(Days::new(n)).unwrap_or(NaiveDate::MIN)
}

/// Count of sorted dates that are `<= day`
fn count_through(sorted: &[NaiveDate], day: NaiveDate) -> usize {
    sorted.partition_point(|d| *d <= day)
}

/// Count of sorted dates equal to `day`
fn count_on(sorted: &[NaiveDate], day: NaiveDate) -> usize {
    count_through(sorted, day) - sorted.partition_point(|d| *d < day)
}

pub fn build_growth_series(
    snapshot: &NormalizedSnapshot,
    today: NaiveDate,
    window_days: u32,
) -> Vec<GrowthPoint> {
    let timelines: Vec<UserTimeline> = snapshot
        .users
        .iter()
        .map(|user| {
            let mut activity: Vec<NaiveDate> = user
                .last_sign_in_at
                .into_iter()
                .chain(
                    snapshot
                        .applications_for(&user.id)
                        .filter_map(|a| a.created_at),
                )
                .map(|t| t.date_naive())
                .collect();
            activity.sort_unstable();
            UserTimeline {
                created: user.created_at.map(|t| t.date_naive()),
                activity,
            }
        })
        .collect();

    let mut user_dates: Vec<NaiveDate> = timelines.iter().filter_map(|t| t.created).collect();
    user_dates.sort_unstable();

    let mut application_dates: Vec<NaiveDate> = snapshot
        .applications
        .iter()
        .filter_map(|a| a.created_at.map(|t| t.date_naive()))
        .collect();
    application_dates.sort_unstable();

    // day -> (total session minutes, timed sessions)
    let mut sessions_by_day: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
    for event in snapshot.events.iter().filter(|e| e.session_duration_ms > 0) {
        if let Some(ts) = event.timestamp {
            let slot = sessions_by_day.entry(ts.date_naive()).or_insert((0.0, 0));
            slot.0 += event.session_minutes();
            slot.1 += 1;
        }
    }

    let first_day = days_before(today, u64::from(window_days));

    (0..=u64::from(window_days))
        .map(|offset| {
            let day = first_day
                .checked_add_days(Days::new(offset))
                .unwrap_or(today);
            let mut point = GrowthPoint::empty(day);

            point.total_users = count_through(&user_dates, day);
            point.new_users = count_on(&user_dates, day);
            point.total_applications = count_through(&application_dates, day);
            point.applications_per_user = round2(
                point.total_applications as f64 / point.total_users.max(1) as f64,
            );

            let cohort_cutoff = days_before(day, ACTIVE_WINDOW_DAYS as u64);
            let (mut cohort, mut retained) = (0usize, 0usize);
            for timeline in &timelines {
                // undated users and users created after `day` are never counted
                let exists = timeline.created.map_or(false, |c| c <= day);
                let active = exists && timeline.active_on(day);
                if active {
                    point.active_users += 1;
                }
                if timeline.created.map_or(false, |c| c <= cohort_cutoff) {
                    cohort += 1;
                    if active {
                        retained += 1;
                    }
                }
            }
            point.retention_percent = ratio_percent(retained, cohort);

            if let Some((minutes, sessions)) = sessions_by_day.get(&day) {
                point.avg_session_time = round2(minutes / (*sessions).max(1) as f64);
            }

            point
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::RecordNormalizer;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn snapshot(value: serde_json::Value) -> NormalizedSnapshot {
        RecordNormalizer::normalize(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_series_length_and_order() {
        let snap = NormalizedSnapshot::default();
        for window in [0u32, 1, 7, 30, 90, 365] {
            let series = build_growth_series(&snap, day("2024-06-30"), window);
            assert_eq!(series.len(), window as usize + 1);
            assert_eq!(series.last().unwrap().date, day("2024-06-30"));
            assert!(series.windows(2).all(|w| w[0].date < w[1].date));
        }
    }

    #[test]
    fn test_empty_snapshot_series_is_zero() {
        let series = build_growth_series(&NormalizedSnapshot::default(), day("2024-06-30"), 7);
        for point in &series {
            assert_eq!(*point, GrowthPoint::empty(point.date));
        }
    }

    #[test]
    fn test_cumulative_and_daily_counts() {
        let snap = snapshot(json!({
            "users": [
                {"id": "u1", "createdAt": "2024-06-25T08:00:00Z"},
                {"id": "u2", "createdAt": "2024-06-27T08:00:00Z"},
                {"id": "u3", "createdAt": "garbage"}
            ],
            "applications": [
                {"userId": "u1", "createdAt": "2024-06-26T10:00:00Z"},
                {"userId": "u1", "createdAt": "2024-06-28T10:00:00Z"},
                {"userId": "u2"}
            ]
        }));
        let series = build_growth_series(&snap, day("2024-06-30"), 7);
        let by_day = |d: &str| series.iter().find(|p| p.date == day(d)).unwrap();

        assert_eq!(by_day("2024-06-24").total_users, 0);
        assert_eq!(by_day("2024-06-25").new_users, 1);
        assert_eq!(by_day("2024-06-26").total_applications, 1);
        assert_eq!(by_day("2024-06-27").total_users, 2);
        assert_eq!(by_day("2024-06-30").total_applications, 2);
        assert_eq!(by_day("2024-06-30").applications_per_user, 1.0);
        // u1 applied on the 26th, active through the 3rd of July
        assert_eq!(by_day("2024-06-26").active_users, 1);
        assert_eq!(by_day("2024-06-25").active_users, 0);
    }

    #[test]
    fn test_active_users_only_counts_existing_users() {
        let snap = snapshot(json!({
            "users": [
                {"id": "undated", "createdAt": "garbage", "lastSignInAt": "2024-06-25T09:00:00Z"},
                {"id": "late", "createdAt": "2024-06-29T09:00:00Z"}
            ],
            "applications": [
                {"userId": "late", "createdAt": "2024-06-24T09:00:00Z"}
            ]
        }));
        let series = build_growth_series(&snap, day("2024-06-30"), 7);
        let by_day = |d: &str| series.iter().find(|p| p.date == day(d)).unwrap();

        assert_eq!(by_day("2024-06-25").active_users, 0);
        assert_eq!(by_day("2024-06-28").active_users, 0);
        assert_eq!(by_day("2024-06-29").active_users, 1);
        assert_eq!(by_day("2024-06-30").total_users, 1);
        assert_eq!(by_day("2024-06-30").active_users, 1);
        for point in &series {
            assert!(point.active_users <= point.total_users, "{}", point.date);
        }
    }

    #[test]
    fn test_retention_and_session_time() {
        let snap = snapshot(json!({
            "users": [
                {"id": "u1", "createdAt": "2024-06-01T00:00:00Z", "lastSignInAt": "2024-06-29T00:00:00Z"},
                {"id": "u2", "createdAt": "2024-06-01T00:00:00Z"}
            ],
            "events": [
                {"userId": "u1", "timestamp": "2024-06-30T09:00:00Z", "sessionDurationMs": 120000},
                {"userId": "u2", "timestamp": "2024-06-30T10:00:00Z", "sessionDurationMs": 240000},
                {"userId": "u2", "timestamp": "2024-06-30T11:00:00Z", "sessionDurationMs": 0}
            ]
        }));
        let series = build_growth_series(&snap, day("2024-06-30"), 0);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].retention_percent, 50.0);
        assert_eq!(series[0].avg_session_time, 3.0);
    }
}
