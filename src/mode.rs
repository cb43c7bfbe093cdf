//! Mode Selector
//!
//! Decides whether a refresh computes metrics for the whole platform or falls
//! back to the single local user. The choice is made once, upstream, and handed
//! to the analyzer as a [`ComputationPath`]; calculators never look at auth
//! state.
//!
//! ```text
//!          fetch ok (authenticated + connected)
//!   LOCAL ───────────────────────────────────────▶ PLATFORM
//!     ▲                                              │
//!     └──────────── signed out / offline ────────────┘
//! ```
//!
//! A failed platform fetch leaves the selector where it was.

use crate::models::AnalyticsMode;
use crate::normalizer::NormalizedSnapshot;
use chrono::{DateTime, Utc};
use tracing::info;

/// Identity used when nobody is signed in
pub const ANONYMOUS_LOCAL_USER: &str = "local-user";

/// Auth/session information supplied by the host application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub connected: bool,
}

impl AuthState {
    pub fn signed_in(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            is_authenticated: true,
            user_id: Some(user_id.into()),
            email,
            connected: true,
        }
    }

    pub fn offline(mut self) -> Self {
        self.connected = false;
        self
    }

    fn wants_platform(&self) -> bool {
        self.is_authenticated && self.connected
    }
}

/// How the next computation pass treats the fetched records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputationPath {
    Local {
        user_id: String,
        email: Option<String>,
    },
    Platform,
}

impl ComputationPath {
    pub fn mode(&self) -> AnalyticsMode {
        match self {
            Self::Local { .. } => AnalyticsMode::Local,
            Self::Platform => AnalyticsMode::Platform,
        }
    }

    /// The single point where local and platform computation differ
    pub fn prepare(&self, snapshot: NormalizedSnapshot, now: DateTime<Utc>) -> NormalizedSnapshot {
        match self {
            Self::Local { user_id, email } => {
                snapshot.assign_to_local_user(user_id, email.as_deref(), now)
            }
            Self::Platform => snapshot,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeSelector {
    mode: AnalyticsMode,
    auth: AuthState,
}

impl Default for ModeSelector {
    fn default() -> Self {
        Self::new(AuthState::default())
    }
}

impl ModeSelector {
    pub fn new(auth: AuthState) -> Self {
        Self {
            mode: AnalyticsMode::Local,
            auth,
        }
    }

    pub fn mode(&self) -> AnalyticsMode {
        self.mode
    }

    pub fn update_auth(&mut self, auth: AuthState) {
        if !auth.wants_platform() && self.mode == AnalyticsMode::Platform {
            info!("Session ended or went offline, falling back to local analytics");
            self.mode = AnalyticsMode::Local;
        }
        self.auth = auth;
    }

    /// Path the next refresh should attempt
    pub fn next_path(&self) -> ComputationPath {
        if self.auth.wants_platform() {
            ComputationPath::Platform
        } else {
            ComputationPath::Local {
                user_id: self
                    .auth
                    .user_id
                    .clone()
                    .unwrap_or_else(|| ANONYMOUS_LOCAL_USER.to_string()),
                email: self.auth.email.clone(),
            }
        }
    }

    /// Commit a successful refresh. Platform is only entered if the session
    /// still allows it; auth may have changed while the fetch was in flight.
    pub fn record_success(&mut self, attempted: &ComputationPath) {
        let next = match attempted {
            ComputationPath::Platform if self.auth.wants_platform() => AnalyticsMode::Platform,
            ComputationPath::Platform => self.mode,
            ComputationPath::Local { .. } => AnalyticsMode::Local,
        };
        if next != self.mode {
            info!(from = %self.mode, to = %next, "Analytics mode changed");
            self.mode = next;
        }
    }
}
