//! Scheduler and tick-loop configuration.
//!
//! Both configs have sensible defaults, builder-style overrides, and a
//! `from_env` constructor reading the `STAR_*` environment variables.
//! Malformed values are logged and ignored.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Environment variable overriding [`SchedulerConfig::max_workers`].
pub const MAX_WORKERS_ENV: &str = "STAR_MAX_WORKERS";

/// Environment variable overriding [`TickConfig::tick_rate`].
pub const TICK_RATE_ENV: &str = "STAR_TICK_RATE";

/// Environment variable overriding [`TickConfig::max_ticks`].
pub const MAX_TICKS_ENV: &str = "STAR_MAX_TICKS";

/// Configuration for the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of systems running at the same time.
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map_or(4, usize::from);
        Self {
            max_workers: cores.max(2),
        }
    }
}

impl SchedulerConfig {
    /// Read overrides from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max_workers) = env_parse::<usize>(MAX_WORKERS_ENV) {
            config = config.with_max_workers(max_workers);
        }
        config
    }

    /// Override the worker limit. Values below one are raised to one.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

/// Configuration for the [`TickLoop`](crate::TickLoop).
#[derive(Debug, Clone, PartialEq)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Read overrides from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(tick_rate) = env_parse::<f64>(TICK_RATE_ENV) {
            config = config.with_tick_rate(tick_rate);
        }
        if let Some(max_ticks) = env_parse::<u64>(MAX_TICKS_ENV) {
            config = config.with_max_ticks(max_ticks);
        }
        config
    }

    /// Override the tick rate. Rates that are not positive and finite, or
    /// whose tick period does not fit a [`Duration`], are ignored.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        if tick_rate.is_finite() && period(tick_rate).is_some() {
            self.tick_rate = tick_rate;
        } else {
            warn!(tick_rate, "ignoring invalid tick rate");
        }
        self
    }

    /// Time budget of one tick.
    ///
    /// Falls back to the default rate if `tick_rate` was set to something
    /// unusable through the public field.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        period(self.tick_rate).unwrap_or_else(|| {
            warn!(tick_rate = self.tick_rate, "invalid tick rate, using default");
            Duration::from_secs_f64(1.0 / Self::default().tick_rate)
        })
    }

    /// Override the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

fn period(tick_rate: f64) -> Option<Duration> {
    if tick_rate > 0.0 {
        Duration::try_from_secs_f64(1.0 / tick_rate).ok()
    } else {
        None
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed environment variable");
            None
        }
    }
}
