//! Auto-refresh timer
//!
//! A restartable interval task. Every [`AutoRefreshTimer::restart`] aborts the
//! previous task before spawning a new one, so timers never stack. The first
//! tick fires one full period after the restart.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Default)]
pub struct AutoRefreshTimer {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutoRefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any running timer with one that calls `tick` every `period`.
    ///
    /// Must be called from within a Tokio runtime. `tick` returns `false` to
    /// end the loop.
    pub fn restart<F, Fut>(&self, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if let Some(previous) = handle.take() {
            previous.abort();
        }

        *handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !tick().await {
                    debug!("Auto-refresh owner dropped, stopping timer");
                    break;
                }
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(previous) = self.handle.lock().take() {
            previous.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for AutoRefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> futures::future::Ready<bool> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_after_each_period() {
        let timer = AutoRefreshTimer::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        timer.restart(Duration::from_secs(10), counting(&ticks));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(26)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_stack() {
        let timer = AutoRefreshTimer::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        timer.restart(Duration::from_secs(10), counting(&first));
        timer.restart(Duration::from_secs(10), counting(&second));

        time::sleep(Duration::from_secs(35)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let timer = AutoRefreshTimer::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        timer.restart(Duration::from_secs(10), counting(&ticks));
        timer.stop();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());
    }
}
