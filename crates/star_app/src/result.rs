//! Tick results.

use std::collections::BTreeMap;
use std::time::Duration;

use star_system::SystemError;

/// The outcome of one tick.
///
/// Every system due on the tick appears in exactly one of `per_system`
/// (attempted, or rejected before dispatch) and `cancelled` (never started
/// because the tick was cancelled). Systems whose policy did not call for a
/// run are listed in `skipped`.
#[derive(Debug, Default)]
pub struct TickResult {
    /// The tick this result belongs to.
    pub tick_id: u64,
    /// Outcome per system name.
    pub per_system: BTreeMap<String, Result<(), SystemError>>,
    /// Systems not due on this tick.
    pub skipped: Vec<String>,
    /// Systems left unstarted because the tick was cancelled.
    pub cancelled: Vec<String>,
    /// The waves dispatched, by system name, in dispatch order.
    pub waves: Vec<Vec<String>>,
    /// Wall-clock time spent in the tick.
    pub elapsed: Duration,
}

impl TickResult {
    /// Create an empty result for `tick_id`.
    #[must_use]
    pub fn new(tick_id: u64) -> Self {
        Self {
            tick_id,
            ..Self::default()
        }
    }

    /// The outcome recorded for a system.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Result<(), SystemError>> {
        self.per_system.get(name)
    }

    /// Returns `true` if the system ran and succeeded.
    #[must_use]
    pub fn is_ok(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Ok(())))
    }

    /// The error recorded for a system, if it failed.
    #[must_use]
    pub fn error(&self, name: &str) -> Option<&SystemError> {
        self.get(name).and_then(|outcome| outcome.as_ref().err())
    }

    /// Names of the systems that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.per_system
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(name, _)| name.as_str())
    }

    /// Failed systems with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &SystemError)> {
        self.per_system
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|err| (name.as_str(), err)))
    }

    /// Number of failed systems.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Returns `true` if the tick was cancelled before every system started.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }

    /// Returns `true` if every due system ran and succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.was_cancelled() && self.per_system.values().all(Result::is_ok)
    }

    /// The wave a system was dispatched in, if it was dispatched.
    #[must_use]
    pub fn wave_of(&self, name: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|n| n == name))
    }
}
