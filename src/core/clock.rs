//! Clock & timer abstraction (spec §2.1). Pluggable so tests can drive
//! virtual time via tokio's paused-clock test utilities rather than sleeping
//! in real time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// Monotonic-enough wall clock. `SystemClock` is the production
/// implementation; tests run under `#[tokio::test(start_paused = true)]`
/// and advance time with `tokio::time::advance`, which this clock observes
/// transparently because it is built on `tokio::time::Instant`.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cancellable one-shot timer. Dropping the handle does not cancel the
/// timer; callers must call `cancel()` explicitly so that pause/stop can
/// reason about exactly which timers they tore down.
pub struct TimerHandle {
    join: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(self) {
        self.join.abort();
    }

    /// Wrap an already-spawned task as a cancellable handle (used for the
    /// scheduler's recurring completion-check ticker, which isn't armed via
    /// `schedule_at` since it reschedules itself).
    pub(crate) fn from_join(join: JoinHandle<()>) -> Self {
        Self { join }
    }
}

/// Arms one-shot callbacks against a clock. The default implementation runs
/// callbacks as independent tokio tasks, per the concurrency model in §5:
/// each timer callback is its own task, never holding any scheduler lock
/// across the wait.
#[derive(Clone)]
pub struct TimerSource {
    clock: Arc<dyn Clock>,
}

impl TimerSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Schedule `callback` to run at `at`. If `at` is already in the past,
    /// the callback runs on the next scheduler tick (zero-delay task),
    /// matching the "dispatch immediately" rule in §4.2.
    pub fn schedule_at<F>(&self, at: DateTime<Utc>, callback: F) -> TimerHandle
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let delay = at - self.clock.now();
        let std_delay = delay.to_std().unwrap_or(std::time::Duration::ZERO);

        let join = tokio::spawn(async move {
            if !std_delay.is_zero() {
                tokio::time::sleep(std_delay).await;
            }
            callback.await;
        });

        TimerHandle { join }
    }
}
