//! Refresh coordination
//!
//! This module owns everything about *when* analytics are recomputed:
//!
//! - [`coordinator::RefreshCoordinator`] - single-flight refresh, cached report,
//!   status tracking and error aggregation
//! - [`auto::AutoRefreshTimer`] - cancellable interval timer driving auto-refresh
//!
//! The status shape mirrors what dashboard surfaces read, so it serializes with
//! camelCase keys and is embedded as-is in export documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceError;

pub mod auto;
pub mod coordinator;

pub use coordinator::{RefreshCoordinator, RefreshSettings};

/// Outcome of the most recent completed refresh. Independent of
/// [`RefreshStatus::is_refreshing`] so that an error stays visible while idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub is_refreshing: bool,
    pub last_refresh_timestamp: Option<DateTime<Utc>>,
    pub refresh_status: RefreshState,
    pub auto_refresh_enabled: bool,
    pub auto_refresh_interval_seconds: u64,
    /// Oldest first, bounded by [`RefreshSettings::max_errors`]
    pub refresh_errors: Vec<String>,
}

impl RefreshStatus {
    pub fn new(auto_refresh_interval_seconds: u64) -> Self {
        Self {
            is_refreshing: false,
            last_refresh_timestamp: None,
            refresh_status: RefreshState::Idle,
            auto_refresh_enabled: false,
            auto_refresh_interval_seconds,
            refresh_errors: Vec::new(),
        }
    }

    /// Append an error, dropping the oldest entries beyond `cap`
    pub(crate) fn push_error(&mut self, message: String, cap: usize) {
        self.refresh_errors.push(message);
        if self.refresh_errors.len() > cap {
            let excess = self.refresh_errors.len() - cap;
            self.refresh_errors.drain(..excess);
        }
    }
}

/// Why a refresh cycle failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] SourceError),
    #[error("refresh aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("auto-refresh interval must be at least 1 second")]
    InvalidInterval,
}
