//! Fixed-timestep tick loop.
//!
//! Drives a [`Scheduler`] at the configured rate:
//!
//! 1. Run one tick.
//! 2. Fold the tick's outcome into the [`RunSummary`].
//! 3. Stop once `max_ticks` is reached or shutdown was requested.
//! 4. Sleep for whatever is left of the tick budget.
//!
//! A shutdown request also cancels the tick in progress, so systems that
//! have not started yet are not dispatched.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::TickConfig;
use crate::result::TickResult;
use crate::scheduler::Scheduler;

/// Totals over one [`TickLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// System failures across all ticks.
    pub failures: u64,
    /// Ticks cut short by cancellation.
    pub cancelled_ticks: u64,
    /// Ticks that ran past their time budget.
    pub overruns: u64,
}

/// Drives a scheduler at a fixed rate.
#[derive(Debug)]
pub struct TickLoop {
    scheduler: Scheduler,
    config: TickConfig,
    last_result: Option<TickResult>,
}

impl TickLoop {
    /// Create a loop around `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler, config: TickConfig) -> Self {
        Self {
            scheduler,
            config,
            last_result: None,
        }
    }

    /// Returns the loop configuration.
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Returns the driven scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Returns the driven scheduler mutably, e.g. to change the registration
    /// between runs.
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The result of the most recent tick.
    #[must_use]
    pub fn last_result(&self) -> Option<&TickResult> {
        self.last_result.as_ref()
    }

    /// Give back the scheduler.
    #[must_use]
    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    /// Run until `max_ticks` is reached. With `max_ticks == 0` this never
    /// returns; use [`TickLoop::run_until`] instead.
    pub async fn run(&mut self) -> RunSummary {
        self.run_until(std::future::pending()).await
    }

    /// Run until `max_ticks` is reached or `shutdown` completes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tick_duration = self.config.tick_duration();
        let stopped = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let watcher = {
            let stopped = Arc::clone(&stopped);
            let wake = Arc::clone(&wake);
            let cancel = self.scheduler.cancel_handle();
            tokio::spawn(async move {
                shutdown.await;
                stopped.store(true, Ordering::SeqCst);
                cancel.cancel();
                wake.notify_one();
            })
        };

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        let mut summary = RunSummary::default();
        while !stopped.load(Ordering::SeqCst) {
            let start = Instant::now();
            let result = self.scheduler.tick().await;

            summary.ticks += 1;
            summary.failures += u64::try_from(result.failure_count()).unwrap_or(u64::MAX);
            if result.was_cancelled() {
                summary.cancelled_ticks += 1;
            }
            self.last_result = Some(result);

            if self.config.max_ticks > 0 && summary.ticks >= self.config.max_ticks {
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                tokio::select! {
                    () = tokio::time::sleep(tick_duration - elapsed) => {}
                    () = wake.notified() => {
                        debug!("shutdown requested while idle");
                    }
                }
            } else {
                summary.overruns += 1;
                warn!(
                    tick_id = self.scheduler.tick_id(),
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    budget_ms = u64::try_from(tick_duration.as_millis()).unwrap_or(u64::MAX),
                    "tick exceeded time budget"
                );
            }
        }

        watcher.abort();
        if stopped.load(Ordering::SeqCst) {
            // A request that arrived after the last tick must not leak into
            // the next run.
            self.scheduler.cancel_handle().clear();
        }

        info!(
            ticks = summary.ticks,
            failures = summary.failures,
            cancelled_ticks = summary.cancelled_ticks,
            overruns = summary.overruns,
            "tick loop complete"
        );
        summary
    }
}
