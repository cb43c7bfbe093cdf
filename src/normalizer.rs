//! Record Normalizer
//!
//! Converts an untyped [`RawRecordSet`] into a [`NormalizedSnapshot`] in a single
//! pass. Nothing in here returns an error: every malformed field falls back to a
//! documented default so that downstream calculators can be written without any
//! error handling.
//!
//! ## Fallbacks
//!
//! - Unparseable or missing dates become `None`. Such records are left out of
//!   date-bucketed aggregates but still count toward totals.
//! - Missing ids are synthesized (`unknown-user-<n>`, `unknown-application-<n>`,
//!   `unknown-goal-<n>`).
//! - A missing `userId` leaves the record orphaned: counted, never joined.
//! - Unknown application statuses become [`ApplicationStatus::Applied`].
//! - Negative or non-numeric session durations become 0.
//! - Duplicate user ids keep the first occurrence.
//!
//! The snapshot also carries the per-user index used for every join, so
//! segment and metric computation stays linear in the number of users.

use crate::models::*;
use crate::timestamp_parser::TimestampParser;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Strictly typed view of one fetched record set
#[derive(Debug, Clone, Default)]
pub struct NormalizedSnapshot {
    pub users: Vec<UserProfile>,
    pub applications: Vec<Application>,
    pub goals: Vec<Goal>,
    pub events: Vec<UsageEvent>,
    index: UserIndex,
}

/// userId -> record positions, built once per snapshot
#[derive(Debug, Clone, Default)]
struct UserIndex {
    applications: HashMap<String, Vec<usize>>,
    events: HashMap<String, Vec<usize>>,
    goals: HashMap<String, usize>,
}

impl UserIndex {
    fn build(applications: &[Application], goals: &[Goal], events: &[UsageEvent]) -> Self {
        let mut index = Self::default();

        for (pos, app) in applications.iter().enumerate() {
            if let Some(user_id) = &app.user_id {
                index
                    .applications
                    .entry(user_id.clone())
                    .or_default()
                    .push(pos);
            }
        }
        for (pos, event) in events.iter().enumerate() {
            if let Some(user_id) = &event.user_id {
                index.events.entry(user_id.clone()).or_default().push(pos);
            }
        }
        for goal in goals {
            if let Some(user_id) = &goal.user_id {
                *index.goals.entry(user_id.clone()).or_insert(0) += 1;
            }
        }

        index
    }
}

impl NormalizedSnapshot {
    pub fn new(
        users: Vec<UserProfile>,
        applications: Vec<Application>,
        goals: Vec<Goal>,
        events: Vec<UsageEvent>,
    ) -> Self {
        let index = UserIndex::build(&applications, &goals, &events);
        Self {
            users,
            applications,
            goals,
            events,
            index,
        }
    }

    pub fn applications_for<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a Application> + 'a {
        self.index
            .applications
            .get(user_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.applications[pos])
    }

    pub fn events_for<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a UsageEvent> + 'a {
        self.index
            .events
            .get(user_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.events[pos])
    }

    pub fn application_count(&self, user_id: &str) -> usize {
        self.index
            .applications
            .get(user_id)
            .map_or(0, |positions| positions.len())
    }

    pub fn goal_count(&self, user_id: &str) -> usize {
        self.index.goals.get(user_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.applications.is_empty() && self.events.is_empty()
    }

    /// Fold every record into a single user, used for the local fallback.
    ///
    /// Records without an owner are assigned to `user_id`. When the snapshot has
    /// no user at all one is synthesized, created at the earliest dated record
    /// and signed in at `signed_in_at`.
    pub fn assign_to_local_user(
        mut self,
        user_id: &str,
        email: Option<&str>,
        signed_in_at: DateTime<Utc>,
    ) -> Self {
        for app in &mut self.applications {
            app.user_id.get_or_insert_with(|| user_id.to_string());
        }
        for goal in &mut self.goals {
            goal.user_id.get_or_insert_with(|| user_id.to_string());
        }
        for event in &mut self.events {
            event.user_id.get_or_insert_with(|| user_id.to_string());
        }

        if self.users.is_empty() {
            let earliest = self
                .applications
                .iter()
                .filter_map(|a| a.created_at)
                .chain(self.goals.iter().filter_map(|g| g.created_at))
                .chain(self.events.iter().filter_map(|e| e.timestamp))
                .min()
                .unwrap_or(signed_in_at);

            debug!(user_id, "Synthesizing local user profile");
            self.users.push(UserProfile {
                id: user_id.to_string(),
                email: email.map(str::to_string),
                created_at: Some(earliest),
                last_sign_in_at: Some(signed_in_at),
            });
        }

        Self::new(self.users, self.applications, self.goals, self.events)
    }
}

/// Whether a record created at `created` is visible at instant `at`.
///
/// Undated records exist only in the present: they count when `at` is `now`
/// and are invisible to any earlier view.
pub fn visible_at(created: Option<DateTime<Utc>>, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match created {
        Some(created) => created <= at,
        None => at >= now,
    }
}

pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn normalize(raw: RawRecordSet) -> NormalizedSnapshot {
        let mut seen = HashSet::new();
        let mut malformed_dates = 0usize;

        let mut users = Vec::with_capacity(raw.users.len());
        for (n, record) in raw.users.into_iter().enumerate() {
            let user = Self::normalize_user(record, n, &mut malformed_dates);
            if !seen.insert(user.id.clone()) {
                debug!(user_id = %user.id, "Dropping duplicate user record");
                continue;
            }
            users.push(user);
        }

        let applications: Vec<Application> = raw
            .applications
            .into_iter()
            .enumerate()
            .map(|(n, record)| Self::normalize_application(record, n, &mut malformed_dates))
            .collect();

        let goals: Vec<Goal> = raw
            .goals
            .into_iter()
            .enumerate()
            .map(|(n, record)| Goal {
                id: text(record.id.as_ref()).unwrap_or_else(|| format!("unknown-goal-{}", n)),
                user_id: text(record.user_id.as_ref()),
                completed: flag(record.completed.as_ref()),
                created_at: date(record.created_at.as_ref(), &mut malformed_dates),
            })
            .collect();

        let events: Vec<UsageEvent> = raw
            .events
            .into_iter()
            .map(|record| UsageEvent {
                user_id: text(record.user_id.as_ref()),
                event_type: text(record.event_type.as_ref()).unwrap_or_else(|| "unknown".to_string()),
                timestamp: date(record.timestamp.as_ref(), &mut malformed_dates),
                session_duration_ms: duration_ms(record.session_duration_ms.as_ref()),
            })
            .collect();

        if malformed_dates > 0 {
            debug!(malformed_dates, "Normalized records with unreadable dates");
        }

        NormalizedSnapshot::new(users, applications, goals, events)
    }

    fn normalize_user(record: UserRecord, n: usize, malformed: &mut usize) -> UserProfile {
        UserProfile {
            id: text(record.id.as_ref()).unwrap_or_else(|| format!("unknown-user-{}", n)),
            email: text(record.email.as_ref()),
            created_at: date(record.created_at.as_ref(), malformed),
            last_sign_in_at: date(record.last_sign_in_at.as_ref(), malformed),
        }
    }

    fn normalize_application(
        record: ApplicationRecord,
        n: usize,
        malformed: &mut usize,
    ) -> Application {
        Application {
            id: text(record.id.as_ref()).unwrap_or_else(|| format!("unknown-application-{}", n)),
            user_id: text(record.user_id.as_ref()),
            status: text(record.status.as_ref())
                .map(|s| parse_status(&s))
                .unwrap_or(ApplicationStatus::Applied),
            company: text(record.company.as_ref()),
            position: text(record.position.as_ref()),
            created_at: date(record.created_at.as_ref(), malformed),
        }
    }
}

pub fn parse_status(raw: &str) -> ApplicationStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "interview" | "interviewing" => ApplicationStatus::Interview,
        "offer" => ApplicationStatus::Offer,
        "rejected" => ApplicationStatus::Rejected,
        "accepted" => ApplicationStatus::Accepted,
        _ => ApplicationStatus::Applied,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().map_or(false, |n| n != 0),
        _ => false,
    }
}

fn date(value: Option<&Value>, malformed: &mut usize) -> Option<DateTime<Utc>> {
    let parsed = TimestampParser::parse_value(value);
    if parsed.is_none() && value.map_or(false, |v| !v.is_null()) {
        *malformed += 1;
    }
    parsed
}

fn duration_ms(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}
