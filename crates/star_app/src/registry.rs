//! System registry: the ordered set of active systems.
//!
//! Registration order matters: it is the order the execution plan walks
//! when it assembles waves. Each entry caches the system's access set and
//! policy so `data()` is consulted exactly once per registration.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use star_component::{AccessSet, Accessor};
use star_system::{ExecutionPolicy, System};

use crate::error::RegistrationError;

/// A validated, registered system.
#[derive(Clone)]
pub struct RegisteredSystem {
    /// The system's unique name.
    pub name: String,
    /// The system's merged resource accesses.
    pub access: AccessSet,
    /// When the system runs.
    pub policy: ExecutionPolicy,
    /// The system itself, shared with worker tasks.
    pub system: Arc<dyn System>,
    /// Whether the system has completed a run successfully.
    has_succeeded: bool,
}

impl RegisteredSystem {
    /// Validate a system and capture its declarations.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] for an empty name, a malformed
    /// accessor, or a malformed execution policy.
    pub fn new(system: Box<dyn System>) -> Result<Self, RegistrationError> {
        let name = system.name().to_string();
        if name.is_empty() {
            return Err(RegistrationError::EmptySystemName);
        }

        let accessors: Vec<Accessor> = system.data();
        for accessor in &accessors {
            accessor
                .validate()
                .map_err(|source| RegistrationError::InvalidAccessor {
                    system: name.clone(),
                    source,
                })?;
        }

        let policy = system.policy();
        policy
            .validate()
            .map_err(|reason| RegistrationError::InvalidPolicy {
                system: name.clone(),
                reason,
            })?;

        Ok(Self {
            name,
            access: AccessSet::from_accessors(&accessors),
            policy,
            system: Arc::from(system),
            has_succeeded: false,
        })
    }

    /// Whether the system has completed a run successfully.
    #[must_use]
    pub fn has_succeeded(&self) -> bool {
        self.has_succeeded
    }

    /// Whether the system is due on `tick_id`.
    #[must_use]
    pub fn is_due(&self, tick_id: u64) -> bool {
        self.policy.is_due(tick_id, self.has_succeeded)
    }
}

impl fmt::Debug for RegisteredSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSystem")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("policy", &self.policy)
            .field("has_succeeded", &self.has_succeeded)
            .finish_non_exhaustive()
    }
}

/// Registry of all active systems, in registration order.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: Vec<RegisteredSystem>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Replace the whole registration.
    ///
    /// Either every system is accepted or none is: on error the previous
    /// registration is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistrationError`] found.
    pub fn replace_all(&mut self, systems: Vec<Box<dyn System>>) -> Result<(), RegistrationError> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(systems.len());
        for system in systems {
            let entry = RegisteredSystem::new(system)?;
            if !seen.insert(entry.name.clone()) {
                return Err(RegistrationError::DuplicateSystem(entry.name));
            }
            prepared.push(entry);
        }
        self.systems = prepared;
        Ok(())
    }

    /// Append one system to the registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateSystem`] if the name is taken,
    /// or any validation error from [`RegisteredSystem::new`].
    pub fn register(&mut self, system: Box<dyn System>) -> Result<(), RegistrationError> {
        let entry = RegisteredSystem::new(system)?;
        if self.get(&entry.name).is_some() {
            return Err(RegistrationError::DuplicateSystem(entry.name));
        }
        self.systems.push(entry);
        Ok(())
    }

    /// Remove a system by name.
    ///
    /// Returns `true` if the system was found and removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.index_of(name) {
            Some(pos) => {
                self.systems.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredSystem> {
        self.systems.iter().find(|s| s.name == name)
    }

    /// Returns a system by registration index.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&RegisteredSystem> {
        self.systems.get(index)
    }

    /// Registration index of a system.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.systems.iter().position(|s| s.name == name)
    }

    /// Returns an iterator over all systems in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredSystem> {
        self.systems.iter()
    }

    /// The registered systems as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[RegisteredSystem] {
        &self.systems
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Record a successful run.
    pub(crate) fn mark_succeeded(&mut self, index: usize) {
        if let Some(entry) = self.systems.get_mut(index) {
            entry.has_succeeded = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use star_component::AccessMode;
    use star_system::SystemConfig;

    use super::*;

    fn make_system(name: &str, accessors: Vec<Accessor>) -> Box<dyn System> {
        Box::new(
            SystemConfig::new(name)
                .with_accessors(accessors)
                .build(|_| Ok(())),
        )
    }

    #[test]
    fn test_register_new_system() {
        let mut registry = SystemRegistry::new();
        registry
            .register(make_system("physics", vec![Accessor::write("velocity")]))
            .unwrap();
        assert_eq!(registry.len(), 1);
        let entry = registry.get("physics").unwrap();
        assert_eq!(entry.access.mode_of("velocity"), Some(AccessMode::Write));
        assert!(!entry.has_succeeded());
    }

    #[test]
    fn test_register_duplicate_name_rejected() {
        let mut registry = SystemRegistry::new();
        registry.register(make_system("physics", vec![])).unwrap();
        assert_eq!(
            registry.register(make_system("physics", vec![])),
            Err(RegistrationError::DuplicateSystem("physics".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_all_keeps_order() {
        let mut registry = SystemRegistry::new();
        registry
            .replace_all(vec![
                make_system("input", vec![]),
                make_system("physics", vec![]),
                make_system("render", vec![]),
            ])
            .unwrap();
        let names: Vec<_> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["input", "physics", "render"]);
        assert_eq!(registry.index_of("render"), Some(2));
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let mut registry = SystemRegistry::new();
        registry.register(make_system("old", vec![])).unwrap();

        let err = registry
            .replace_all(vec![
                make_system("good", vec![Accessor::read("x")]),
                make_system("bad", vec![Accessor::read("")]),
            ])
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidAccessor { system, .. } if system == "bad"));

        let names: Vec<_> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["old"]);
    }

    #[test]
    fn test_replace_all_rejects_duplicates() {
        let mut registry = SystemRegistry::new();
        let err = registry
            .replace_all(vec![make_system("a", vec![]), make_system("a", vec![])])
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateSystem("a".to_string()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = SystemRegistry::new();
        assert_eq!(
            registry.register(make_system("", vec![])),
            Err(RegistrationError::EmptySystemName)
        );
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut registry = SystemRegistry::new();
        let system = SystemConfig::new("sparse")
            .with_policy(ExecutionPolicy::EveryNTicks(0))
            .build(|_| Ok(()));
        assert!(matches!(
            registry.register(Box::new(system)),
            Err(RegistrationError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_unregister() {
        let mut registry = SystemRegistry::new();
        registry.register(make_system("physics", vec![])).unwrap();
        assert!(registry.unregister("physics"));
        assert!(!registry.unregister("physics"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_mark_succeeded_flips_on_init_only() {
        let mut registry = SystemRegistry::new();
        let system = SystemConfig::new("setup")
            .with_policy(ExecutionPolicy::OnInitOnly)
            .build(|_| Ok(()));
        registry.register(Box::new(system)).unwrap();
        assert!(registry.get("setup").unwrap().is_due(1));
        registry.mark_succeeded(0);
        assert!(!registry.get("setup").unwrap().is_due(2));
    }
}
