//! The [`System`] trait and its execution policies.

use serde::{Deserialize, Serialize};
use star_component::{AccessSet, Accessor};

use crate::context::SystemContext;

/// When a registered system is due to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionPolicy {
    /// Run on every tick.
    #[default]
    EveryTick,
    /// Run on ticks whose id is a multiple of `n` (`n` must be non-zero).
    EveryNTicks(u32),
    /// Run on every tick until the first successful run, then never again.
    OnInitOnly,
    /// Never run.
    Disabled,
}

impl ExecutionPolicy {
    /// Check that the policy is well formed.
    ///
    /// # Errors
    ///
    /// Returns a reason string for `EveryNTicks(0)`.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::EveryNTicks(0) => Err("EveryNTicks interval must be non-zero"),
            _ => Ok(()),
        }
    }

    /// Whether a system with this policy should run on `tick_id`.
    ///
    /// `has_succeeded` records whether the system has completed a run
    /// successfully since it was registered.
    #[must_use]
    pub fn is_due(&self, tick_id: u64, has_succeeded: bool) -> bool {
        match *self {
            Self::EveryTick => true,
            Self::EveryNTicks(0) => false,
            Self::EveryNTicks(n) => tick_id % u64::from(n) == 0,
            Self::OnInitOnly => !has_succeeded,
            Self::Disabled => false,
        }
    }
}

/// A unit of per-tick logic.
///
/// A system declares the resources it touches through [`System::data`] and
/// does its work in [`System::run`]. The scheduler calls `data` once at
/// registration time; the declared accessors are fixed from then on.
///
/// Systems are shared between worker threads, so `run` takes `&self`. Any
/// state a system keeps between ticks belongs either in a World resource it
/// writes or behind its own synchronisation.
///
/// # Examples
///
/// ```rust
/// use star_component::Accessor;
/// use star_system::{System, SystemContext};
///
/// struct Gravity;
///
/// impl System for Gravity {
///     fn name(&self) -> &str {
///         "gravity"
///     }
///
///     fn data(&self) -> Vec<Accessor> {
///         vec![Accessor::write("velocity")]
///     }
///
///     fn run(&self, ctx: &mut SystemContext) -> anyhow::Result<()> {
///         *ctx.write::<f32>("velocity")? -= 9.81 * ctx.dt as f32;
///         Ok(())
///     }
/// }
/// ```
pub trait System: Send + Sync + 'static {
    /// Unique name of the system within a registration.
    fn name(&self) -> &str;

    /// The accessors this system declares.
    fn data(&self) -> Vec<Accessor>;

    /// When this system is due to run. Defaults to every tick.
    fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::EveryTick
    }

    /// Run the system against its resolved resources.
    ///
    /// # Errors
    ///
    /// Any error is recorded against this system for the current tick.
    fn run(&self, ctx: &mut SystemContext) -> anyhow::Result<()>;

    /// The merged access set of [`System::data`].
    fn access(&self) -> AccessSet {
        AccessSet::from_accessors(&self.data())
    }
}
