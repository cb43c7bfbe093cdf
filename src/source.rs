//! Record sources
//!
//! The coordinator only knows the [`DataSource`] trait. Two implementations
//! ship with the crate:
//!
//! - [`JsonDirSource`] reads `users.json`, `applications.json`, `goals.json` and
//!   `events.json` from a directory, each holding a JSON array
//! - [`InMemorySource`] serves a fixed [`RawRecordSet`], used for the empty local
//!   fallback and in tests
//!
//! Timeouts are the source's concern: [`JsonDirSource::with_timeout`] bounds
//! every individual fetch.

use crate::models::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single fetch. `Clone` so every coalesced caller can receive it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("malformed data in {path}: {message}")]
    Malformed { path: String, message: String },
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_all_users(&self) -> Result<Vec<UserRecord>, SourceError>;
    async fn fetch_all_applications(&self) -> Result<Vec<ApplicationRecord>, SourceError>;
    async fn fetch_all_goals(&self) -> Result<Vec<GoalRecord>, SourceError>;
    async fn fetch_all_events(&self) -> Result<Vec<EventRecord>, SourceError>;
}

/// Fetch all four collections concurrently. Any single failure fails the set.
pub async fn fetch_record_set(source: &dyn DataSource) -> Result<RawRecordSet, SourceError> {
    let (users, applications, goals, events) = futures::try_join!(
        source.fetch_all_users(),
        source.fetch_all_applications(),
        source.fetch_all_goals(),
        source.fetch_all_events(),
    )?;

    Ok(RawRecordSet {
        users,
        applications,
        goals,
        events,
    })
}

#[derive(Debug, Clone)]
pub struct JsonDirSource {
    directory: PathBuf,
    timeout: Option<Duration>,
}

impl JsonDirSource {
    pub const USERS_FILE: &'static str = "users.json";
    pub const APPLICATIONS_FILE: &'static str = "applications.json";
    pub const GOALS_FILE: &'static str = "goals.json";
    pub const EVENTS_FILE: &'static str = "events.json";

    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn load<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        file_name: &str,
    ) -> Result<Vec<T>, SourceError> {
        let path = self.directory.join(file_name);
        let read = read_records(&path);

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| SourceError::Timeout {
                    operation,
                    seconds: limit.as_secs(),
                })?,
            None => read.await,
        }
    }
}

async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let items: Vec<Value> = serde_json::from_str(&content).map_err(|e| SourceError::Malformed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| {
            if !item.is_object() {
                warn!(path = %path.display(), position, "Skipping non-object record");
                return None;
            }
            match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %path.display(), position, error = %e, "Skipping unreadable record");
                    None
                }
            }
        })
        .collect();

    debug!(path = %path.display(), total, kept = records.len(), "Loaded records");
    Ok(records)
}

#[async_trait]
impl DataSource for JsonDirSource {
    async fn fetch_all_users(&self) -> Result<Vec<UserRecord>, SourceError> {
        self.load("fetch_all_users", Self::USERS_FILE).await
    }

    async fn fetch_all_applications(&self) -> Result<Vec<ApplicationRecord>, SourceError> {
        self.load("fetch_all_applications", Self::APPLICATIONS_FILE)
            .await
    }

    async fn fetch_all_goals(&self) -> Result<Vec<GoalRecord>, SourceError> {
        self.load("fetch_all_goals", Self::GOALS_FILE).await
    }

    async fn fetch_all_events(&self) -> Result<Vec<EventRecord>, SourceError> {
        self.load("fetch_all_events", Self::EVENTS_FILE).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: RawRecordSet,
}

impl InMemorySource {
    pub fn new(records: RawRecordSet) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn fetch_all_users(&self) -> Result<Vec<UserRecord>, SourceError> {
        Ok(self.records.users.clone())
    }

    async fn fetch_all_applications(&self) -> Result<Vec<ApplicationRecord>, SourceError> {
        Ok(self.records.applications.clone())
    }

    async fn fetch_all_goals(&self) -> Result<Vec<GoalRecord>, SourceError> {
        Ok(self.records.goals.clone())
    }

    async fn fetch_all_events(&self) -> Result<Vec<EventRecord>, SourceError> {
        Ok(self.records.events.clone())
    }
}
