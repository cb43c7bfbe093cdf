//! Refresh coordinator
//!
//! The coordinator is the only writer of [`RefreshStatus`] and of the cached
//! [`AnalyticsReport`]. Dashboard surfaces hold a cloned handle and call
//! [`RefreshCoordinator::request_refresh`] whenever they like; the coordinator
//! guarantees that at most one fetch and one computation pass run at a time.
//!
//! ## Refresh cycle
//!
//! 1. `isRefreshing = true`, the in-flight slot is filled
//! 2. All four collections are fetched concurrently from the source chosen by
//!    the [`ModeSelector`]
//! 3. The [`DashboardAnalyzer`] runs on a blocking thread
//! 4. Under one lock: the report is swapped in (or the error recorded), status
//!    updated, in-flight slot cleared
//!
//! Callers arriving during steps 1-3 await the same shared outcome. The cycle
//! runs in its own task, so it completes even if every caller goes away.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::auto::AutoRefreshTimer;
use super::{CoordinatorError, RefreshError, RefreshState, RefreshStatus};
use crate::analyzer::DashboardAnalyzer;
use crate::config::Config;
use crate::mode::{AuthState, ComputationPath, ModeSelector};
use crate::models::{AnalyticsMode, AnalyticsReport, TimeRange};
use crate::source::{fetch_record_set, DataSource};

pub type RefreshOutcome = Result<Arc<AnalyticsReport>, RefreshError>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub time_range: TimeRange,
    pub max_errors: usize,
    /// Whether [`RefreshCoordinator::start`] turns the timer on
    pub auto_refresh: bool,
    pub auto_refresh_interval_seconds: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            time_range: TimeRange::Month,
            max_errors: 10,
            auto_refresh: false,
            auto_refresh_interval_seconds: 300,
        }
    }
}

impl RefreshSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            time_range: TimeRange::from_days(config.analytics.default_range_days)
                .unwrap_or_default(),
            max_errors: config.refresh.max_errors,
            auto_refresh: config.refresh.auto_refresh_enabled,
            auto_refresh_interval_seconds: config.refresh.interval_seconds,
        }
    }
}

struct State {
    status: RefreshStatus,
    report: Option<Arc<AnalyticsReport>>,
    in_flight: Option<SharedRefresh>,
    mode: ModeSelector,
    time_range: TimeRange,
}

struct Inner {
    platform: Arc<dyn DataSource>,
    local: Arc<dyn DataSource>,
    max_errors: usize,
    auto_refresh: bool,
    state: Mutex<State>,
    status_tx: watch::Sender<RefreshStatus>,
    timer: AutoRefreshTimer,
}

/// Cheap to clone; every clone drives the same coordinator
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// `platform` serves the multi-user records, `local` the signed-out fallback
    pub fn new(
        platform: Arc<dyn DataSource>,
        local: Arc<dyn DataSource>,
        auth: AuthState,
        settings: RefreshSettings,
    ) -> Self {
        let status = RefreshStatus::new(settings.auto_refresh_interval_seconds);
        let (status_tx, _) = watch::channel(status.clone());

        Self {
            inner: Arc::new(Inner {
                platform,
                local,
                max_errors: settings.max_errors.max(1),
                auto_refresh: settings.auto_refresh,
                state: Mutex::new(State {
                    status,
                    report: None,
                    in_flight: None,
                    mode: ModeSelector::new(auth),
                    time_range: settings.time_range,
                }),
                status_tx,
                timer: AutoRefreshTimer::new(),
            }),
        }
    }

    /// Start a refresh, or join the one already in flight.
    ///
    /// All callers attached to the same cycle receive the same outcome. Errors
    /// are also recorded in the status, so callers may ignore the result.
    pub async fn request_refresh(&self) -> RefreshOutcome {
        let shared = {
            let mut state = self.inner.state.lock();
            if let Some(existing) = state.in_flight.clone() {
                debug!("Joining in-flight refresh");
                existing
            } else {
                let path = state.mode.next_path();
                let time_range = state.time_range;
                state.status.is_refreshing = true;
                self.inner.publish(&state.status);

                // Spawned while holding the lock: the cycle cannot finish
                // and clear the slot before it has been filled.
                let cycle = tokio::spawn(Inner::run_cycle(
                    Arc::clone(&self.inner),
                    path,
                    time_range,
                ));
                let shared = cycle
                    .map(|joined| {
                        joined.unwrap_or_else(|e| Err(RefreshError::Aborted(e.to_string())))
                    })
                    .boxed()
                    .shared();
                state.in_flight = Some(shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Apply the configured auto-refresh setting. Returns whether the timer
    /// is now running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<bool, CoordinatorError> {
        if !self.inner.auto_refresh {
            debug!("Auto-refresh disabled by settings");
            return Ok(false);
        }
        let interval = self.inner.state.lock().status.auto_refresh_interval_seconds;
        self.set_auto_refresh(true, interval)?;
        Ok(true)
    }

    /// Enable or disable auto-refresh. Any running timer is cancelled first.
    ///
    /// Must be called from within a Tokio runtime when enabling.
    pub fn set_auto_refresh(
        &self,
        enabled: bool,
        interval_seconds: u64,
    ) -> Result<(), CoordinatorError> {
        if enabled && interval_seconds == 0 {
            return Err(CoordinatorError::InvalidInterval);
        }

        if enabled {
            let weak = Arc::downgrade(&self.inner);
            self.inner
                .timer
                .restart(Duration::from_secs(interval_seconds), move || {
                    auto_refresh_tick(weak.clone())
                });
        } else {
            self.inner.timer.stop();
        }

        let mut state = self.inner.state.lock();
        state.status.auto_refresh_enabled = enabled;
        if interval_seconds > 0 {
            state.status.auto_refresh_interval_seconds = interval_seconds;
        }
        self.inner.publish(&state.status);

        info!(enabled, interval_seconds, "Auto-refresh configured");
        Ok(())
    }

    pub fn status(&self) -> RefreshStatus {
        self.inner.state.lock().status.clone()
    }

    /// Receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<RefreshStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Last successfully computed report, `None` until the first success
    pub fn latest(&self) -> Option<Arc<AnalyticsReport>> {
        self.inner.state.lock().report.clone()
    }

    pub fn mode(&self) -> AnalyticsMode {
        self.inner.state.lock().mode.mode()
    }

    pub fn time_range(&self) -> TimeRange {
        self.inner.state.lock().time_range
    }

    /// Applies from the next refresh on
    pub fn set_time_range(&self, time_range: TimeRange) {
        self.inner.state.lock().time_range = time_range;
    }

    pub fn set_auth_state(&self, auth: AuthState) {
        self.inner.state.lock().mode.update_auth(auth);
    }

    pub fn clear_errors(&self) {
        let mut state = self.inner.state.lock();
        state.status.refresh_errors.clear();
        self.inner.publish(&state.status);
    }

    /// Stop auto-refresh. A refresh already in flight still completes.
    pub fn shutdown(&self) {
        self.inner.timer.stop();
        let mut state = self.inner.state.lock();
        state.status.auto_refresh_enabled = false;
        self.inner.publish(&state.status);
    }
}

async fn auto_refresh_tick(weak: Weak<Inner>) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    let coordinator = RefreshCoordinator { inner };
    if let Err(e) = coordinator.request_refresh().await {
        debug!(error = %e, "Auto-refresh tick failed");
    }
    true
}

impl Inner {
    fn publish(&self, status: &RefreshStatus) {
        self.status_tx.send_replace(status.clone());
    }

    fn source_for(&self, path: &ComputationPath) -> Arc<dyn DataSource> {
        match path {
            ComputationPath::Platform => Arc::clone(&self.platform),
            ComputationPath::Local { .. } => Arc::clone(&self.local),
        }
    }

    async fn run_cycle(inner: Arc<Inner>, path: ComputationPath, time_range: TimeRange) -> RefreshOutcome {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("refresh_cycle", cycle_id = %cycle_id, mode = %path.mode());

        // a panicking source or calculator still has to release the in-flight slot
        let outcome = AssertUnwindSafe(inner.execute(path.clone(), time_range))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|payload| Err(RefreshError::Aborted(panic_message(payload.as_ref()))));
        span.in_scope(|| inner.finish(&path, outcome.clone()));
        outcome
    }

    async fn execute(&self, path: ComputationPath, time_range: TimeRange) -> RefreshOutcome {
        let source = self.source_for(&path);
        let raw = fetch_record_set(source.as_ref()).await?;
        if raw.is_empty() {
            info!("Source returned no records");
        }
        debug!(
            users = raw.users.len(),
            applications = raw.applications.len(),
            goals = raw.goals.len(),
            events = raw.events.len(),
            "Fetched raw records"
        );

        let analyzer = DashboardAnalyzer::new(time_range);
        let report = tokio::task::spawn_blocking(move || analyzer.analyze(raw, &path, Utc::now()))
            .await
            .map_err(|e| RefreshError::Aborted(e.to_string()))?;

        Ok(Arc::new(report))
    }

    fn finish(&self, path: &ComputationPath, outcome: RefreshOutcome) {
        let mut state = self.state.lock();
        state.in_flight = None;
        state.status.is_refreshing = false;

        match outcome {
            Ok(report) => {
                state.report = Some(report);
                state.status.last_refresh_timestamp = Some(Utc::now());
                state.status.refresh_status = RefreshState::Success;
                state.mode.record_success(path);
                info!(mode = %state.mode.mode(), "Refresh completed");
            }
            Err(e) => {
                // cached report is left untouched
                state.status.refresh_status = RefreshState::Error;
                state.status.push_error(e.to_string(), self.max_errors);
                warn!(error = %e, "Refresh failed, keeping previous results");
            }
        }

        self.publish(&state.status);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "refresh panicked".to_string())
}
