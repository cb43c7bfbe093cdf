#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jobtrack_analytics::models::*;
use jobtrack_analytics::source::{DataSource, SourceError};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Builds raw record sets the way the backend would return them
#[derive(Default)]
pub struct RecordFixture {
    users: Vec<Value>,
    applications: Vec<Value>,
    goals: Vec<Value>,
    events: Vec<Value>,
}

impl RecordFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, id: &str, created: DateTime<Utc>, last_sign_in: Option<DateTime<Utc>>) -> Self {
        let mut user = json!({
            "id": id,
            "email": format!("{}@example.com", id),
            "createdAt": created.to_rfc3339(),
        });
        if let Some(at) = last_sign_in {
            user["lastSignInAt"] = json!(at.to_rfc3339());
        }
        self.users.push(user);
        self
    }

    pub fn application(mut self, user_id: &str, status: &str, created: DateTime<Utc>) -> Self {
        let n = self.applications.len();
        self.applications.push(json!({
            "id": format!("app-{}", n),
            "userId": user_id,
            "status": status,
            "company": "Acme",
            "position": "Engineer",
            "createdAt": created.to_rfc3339(),
        }));
        self
    }

    pub fn goal(mut self, user_id: &str, completed: bool) -> Self {
        let n = self.goals.len();
        self.goals.push(json!({
            "id": format!("goal-{}", n),
            "userId": user_id,
            "completed": completed,
        }));
        self
    }

    pub fn session(mut self, user_id: &str, at: DateTime<Utc>, minutes: u64) -> Self {
        self.events.push(json!({
            "userId": user_id,
            "type": "session",
            "timestamp": at.to_rfc3339(),
            "sessionDurationMs": minutes * 60_000,
        }));
        self
    }

    pub fn build(&self) -> RawRecordSet {
        serde_json::from_value(json!({
            "users": self.users,
            "applications": self.applications,
            "goals": self.goals,
            "events": self.events,
        }))
        .expect("fixture records deserialize")
    }

    /// Write the four collection files into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join("users.json"), serde_json::to_string(&self.users)?)?;
        fs::write(dir.join("applications.json"), serde_json::to_string(&self.applications)?)?;
        fs::write(dir.join("goals.json"), serde_json::to_string(&self.goals)?)?;
        fs::write(dir.join("events.json"), serde_json::to_string(&self.events)?)?;
        Ok(())
    }
}

/// Three users with a spread of activity over the last month
pub fn sample_fixture(now: DateTime<Utc>) -> RecordFixture {
    RecordFixture::new()
        .user("alice", now - Duration::days(90), Some(now - Duration::days(1)))
        .user("bob", now - Duration::days(10), Some(now - Duration::days(2)))
        .user("carol", now - Duration::days(120), Some(now - Duration::days(60)))
        .application("alice", "Applied", now - Duration::days(20))
        .application("alice", "Interview", now - Duration::days(12))
        .application("alice", "Offer", now - Duration::days(3))
        .application("alice", "Rejected", now - Duration::days(2))
        .application("alice", "Applied", now - Duration::days(1))
        .application("alice", "Applied", now - Duration::hours(5))
        .application("bob", "Applied", now - Duration::days(4))
        .goal("alice", false)
        .goal("bob", true)
        .session("alice", now - Duration::days(1), 25)
        .session("bob", now - Duration::days(2), 10)
}

/// Data source that counts fetches, can be slowed down and made to fail.
/// Failures come from the users fetch and name the attempt number.
pub struct CountingSource {
    records: RawRecordSet,
    delay: std::time::Duration,
    user_fetches: AtomicUsize,
    failing: AtomicBool,
    panicking: AtomicBool,
}

impl CountingSource {
    pub fn new(records: RawRecordSet) -> Self {
        Self {
            records,
            delay: std::time::Duration::ZERO,
            user_fetches: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            panicking: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the users fetch panic instead of returning an error
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.user_fetches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl DataSource for CountingSource {
    async fn fetch_all_users(&self) -> Result<Vec<UserRecord>, SourceError> {
        let attempt = self.user_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause().await;
        if self.panicking.load(Ordering::SeqCst) {
            panic!("users fetch crashed on attempt {}", attempt);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable(format!("attempt {}", attempt)));
        }
        Ok(self.records.users.clone())
    }

    async fn fetch_all_applications(&self) -> Result<Vec<ApplicationRecord>, SourceError> {
        self.pause().await;
        Ok(self.records.applications.clone())
    }

    async fn fetch_all_goals(&self) -> Result<Vec<GoalRecord>, SourceError> {
        self.pause().await;
        Ok(self.records.goals.clone())
    }

    async fn fetch_all_events(&self) -> Result<Vec<EventRecord>, SourceError> {
        self.pause().await;
        Ok(self.records.events.clone())
    }
}
