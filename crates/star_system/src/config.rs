//! System configuration and closure-backed systems.

use std::fmt;

use star_component::Accessor;

use crate::context::SystemContext;
use crate::system::{ExecutionPolicy, System};

/// Configuration for a system built from a closure.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Human-readable system name (e.g. `"physics"`).
    pub name: String,
    /// The declared resource accessors.
    pub accessors: Vec<Accessor>,
    /// When the system runs.
    pub policy: ExecutionPolicy,
}

impl SystemConfig {
    /// Create a new system config with the given name and no accessors.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessors: Vec::new(),
            policy: ExecutionPolicy::EveryTick,
        }
    }

    /// Declare read access to a resource.
    #[must_use]
    pub fn read(mut self, name: impl Into<String>) -> Self {
        self.accessors.push(Accessor::read(name));
        self
    }

    /// Declare write access to a resource.
    #[must_use]
    pub fn write(mut self, name: impl Into<String>) -> Self {
        self.accessors.push(Accessor::write(name));
        self
    }

    /// Declare a list of accessors.
    #[must_use]
    pub fn with_accessors(mut self, accessors: impl IntoIterator<Item = Accessor>) -> Self {
        self.accessors.extend(accessors);
        self
    }

    /// Override the execution policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Turn the config into a [`System`] that runs `run_fn` each tick.
    #[must_use]
    pub fn build<F>(self, run_fn: F) -> FnSystem
    where
        F: Fn(&mut SystemContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        FnSystem {
            config: self,
            run_fn: Box::new(run_fn),
        }
    }
}

type RunFn = Box<dyn Fn(&mut SystemContext) -> anyhow::Result<()> + Send + Sync>;

/// A [`System`] whose body is a closure.
pub struct FnSystem {
    config: SystemConfig,
    run_fn: RunFn,
}

impl FnSystem {
    /// The configuration the system was built from.
    #[must_use]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}

impl System for FnSystem {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn data(&self) -> Vec<Accessor> {
        self.config.accessors.clone()
    }

    fn policy(&self) -> ExecutionPolicy {
        self.config.policy
    }

    fn run(&self, ctx: &mut SystemContext) -> anyhow::Result<()> {
        (self.run_fn)(ctx)
    }
}

impl fmt::Debug for FnSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use star_component::{AccessMode, World};

    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SystemConfig::new("physics")
            .read("transform")
            .write("velocity")
            .with_policy(ExecutionPolicy::EveryNTicks(2));
        assert_eq!(config.name, "physics");
        assert_eq!(
            config.accessors,
            vec![Accessor::read("transform"), Accessor::write("velocity")]
        );
        assert_eq!(config.policy, ExecutionPolicy::EveryNTicks(2));
    }

    #[test]
    fn test_fn_system_exposes_config() {
        let system = SystemConfig::new("ai")
            .with_accessors([Accessor::read("transform"), Accessor::write("ai_state")])
            .build(|_| Ok(()));
        assert_eq!(system.name(), "ai");
        assert_eq!(system.data().len(), 2);
        assert_eq!(system.policy(), ExecutionPolicy::EveryTick);
        assert_eq!(system.access().mode_of("ai_state"), Some(AccessMode::Write));
    }

    #[test]
    fn test_fn_system_runs_closure() {
        let world = World::new();
        world.insert("counter", 0_u64);
        let system = SystemConfig::new("count")
            .write("counter")
            .build(|ctx| {
                *ctx.write::<u64>("counter")? += ctx.tick_id;
                Ok(())
            });

        for tick_id in 1..=3 {
            let mut ctx = SystemContext::acquire(&world, &system.access(), tick_id, 0.0).unwrap();
            system.run(&mut ctx).unwrap();
        }
        let handle = world.get("counter").unwrap();
        assert_eq!(*handle.downcast::<u64>().unwrap(), 6);
    }

    #[test]
    fn test_fn_system_error_propagates() {
        let system = SystemConfig::new("broken").build(|_| Err(anyhow::anyhow!("boom")));
        let mut ctx = SystemContext::new(1, 0.0);
        let err = system.run(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
