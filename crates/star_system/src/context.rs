//! Per-tick execution context provided to systems.

use std::any::Any;
use std::collections::BTreeMap;

use star_component::{AccessMode, AccessSet, ResourceMut, ResourceRef, World};
use tracing::trace;

use crate::error::SystemError;

/// Context provided to a system on each tick.
///
/// Holds the World handles resolved from the system's declared accessors,
/// along with tick metadata. The handles live exactly as long as the
/// context: dropping it after `run` returns (or unwinds) releases every
/// resource the system was granted.
#[derive(Debug)]
pub struct SystemContext {
    /// The current tick ID.
    pub tick_id: u64,
    /// Time since the previous tick, in seconds.
    pub dt: f64,
    /// Shared handles, keyed by resource name.
    reads: BTreeMap<String, ResourceRef>,
    /// Exclusive handles, keyed by resource name.
    writes: BTreeMap<String, ResourceMut>,
}

impl SystemContext {
    /// Create a context with no granted resources.
    #[must_use]
    pub fn new(tick_id: u64, dt: f64) -> Self {
        Self {
            tick_id,
            dt,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Resolve every resource in `access` against the World.
    ///
    /// Handles are taken in resource-name order. If any acquisition fails,
    /// the handles taken so far are released before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`SystemError::UnknownResource`] if the World lacks a resource.
    /// - [`SystemError::AccessConflict`] if a resource is held incompatibly.
    pub fn acquire(
        world: &World,
        access: &AccessSet,
        tick_id: u64,
        dt: f64,
    ) -> Result<Self, SystemError> {
        let mut ctx = Self::new(tick_id, dt);
        for (name, mode) in access.iter() {
            trace!(tick_id, resource = name, %mode, "acquiring resource");
            match mode {
                AccessMode::Read => {
                    ctx.reads.insert(name.to_string(), world.get(name)?);
                }
                AccessMode::Write => {
                    ctx.writes.insert(name.to_string(), world.get_mut(name)?);
                }
            }
        }
        Ok(ctx)
    }

    /// Borrow a declared resource as a `T`.
    ///
    /// Resources declared with write access can be read as well.
    ///
    /// # Errors
    ///
    /// - [`SystemError::NotGranted`] if the resource was not declared.
    /// - [`SystemError::TypeMismatch`] if it is not a `T`.
    pub fn read<T: Any>(&self, name: &str) -> Result<&T, SystemError> {
        if let Some(handle) = self.reads.get(name) {
            return Ok(handle.downcast::<T>()?);
        }
        if let Some(handle) = self.writes.get(name) {
            return Ok(handle.downcast::<T>()?);
        }
        Err(SystemError::NotGranted {
            name: name.to_string(),
            mode: AccessMode::Read,
        })
    }

    /// Mutably borrow a resource declared with write access.
    ///
    /// # Errors
    ///
    /// - [`SystemError::NotGranted`] if the resource was not declared for
    ///   writing.
    /// - [`SystemError::TypeMismatch`] if it is not a `T`.
    pub fn write<T: Any>(&mut self, name: &str) -> Result<&mut T, SystemError> {
        match self.writes.get_mut(name) {
            Some(handle) => Ok(handle.downcast_mut::<T>()?),
            None => Err(SystemError::NotGranted {
                name: name.to_string(),
                mode: AccessMode::Write,
            }),
        }
    }

    /// The mode in which `name` was granted, if at all.
    #[must_use]
    pub fn granted(&self, name: &str) -> Option<AccessMode> {
        if self.writes.contains_key(name) {
            Some(AccessMode::Write)
        } else if self.reads.contains_key(name) {
            Some(AccessMode::Read)
        } else {
            None
        }
    }

    /// Number of resource handles held.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.reads.len() + self.writes.len()
    }
}

#[cfg(test)]
mod tests {
    use star_component::Accessor;

    use super::*;

    fn world() -> World {
        let world = World::new();
        world.insert("health", 100_u32);
        world.insert("position", (0.0_f32, 0.0_f32));
        world
    }

    fn access(accessors: &[Accessor]) -> AccessSet {
        AccessSet::from_accessors(accessors)
    }

    #[test]
    fn test_context_creation() {
        let ctx = SystemContext::new(1, 0.016);
        assert_eq!(ctx.tick_id, 1);
        assert!((ctx.dt - 0.016).abs() < f64::EPSILON);
        assert_eq!(ctx.handle_count(), 0);
    }

    #[test]
    fn test_acquire_grants_declared_modes() {
        let world = world();
        let ctx = SystemContext::acquire(
            &world,
            &access(&[Accessor::read("health"), Accessor::write("position")]),
            1,
            0.0,
        )
        .unwrap();
        assert_eq!(ctx.granted("health"), Some(AccessMode::Read));
        assert_eq!(ctx.granted("position"), Some(AccessMode::Write));
        assert_eq!(ctx.granted("mana"), None);
    }

    #[test]
    fn test_read_and_write_same_resource_does_not_self_deadlock() {
        let world = world();
        let mut ctx = SystemContext::acquire(
            &world,
            &access(&[Accessor::read("health"), Accessor::write("health")]),
            1,
            0.0,
        )
        .unwrap();
        assert_eq!(ctx.handle_count(), 1);
        *ctx.write::<u32>("health").unwrap() -= 10;
        assert_eq!(*ctx.read::<u32>("health").unwrap(), 90);
    }

    #[test]
    fn test_write_to_read_only_resource_is_not_granted() {
        let world = world();
        let mut ctx =
            SystemContext::acquire(&world, &access(&[Accessor::read("health")]), 1, 0.0).unwrap();
        assert!(matches!(
            ctx.write::<u32>("health"),
            Err(SystemError::NotGranted { mode: AccessMode::Write, .. })
        ));
        assert!(matches!(
            ctx.read::<u32>("position"),
            Err(SystemError::NotGranted { mode: AccessMode::Read, .. })
        ));
    }

    #[test]
    fn test_acquire_unknown_resource_releases_partial_handles() {
        let world = world();
        // "health" sorts before "y", so it is taken first and must be
        // released again when "y" fails.
        let err = SystemContext::acquire(
            &world,
            &access(&[Accessor::write("health"), Accessor::read("y")]),
            1,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, SystemError::UnknownResource(name) if name == "y"));
        assert!(world.get_mut("health").is_ok());
    }

    #[test]
    fn test_acquire_reports_conflict() {
        let world = world();
        let _held = world.get("health").unwrap();
        let err = SystemContext::acquire(&world, &access(&[Accessor::write("health")]), 1, 0.0)
            .unwrap_err();
        assert!(matches!(err, SystemError::AccessConflict(_)));
    }

    #[test]
    fn test_dropping_context_releases_handles() {
        let world = world();
        let ctx =
            SystemContext::acquire(&world, &access(&[Accessor::write("health")]), 1, 0.0).unwrap();
        assert!(world.get("health").is_err());
        drop(ctx);
        assert!(world.get("health").is_ok());
    }

    #[test]
    fn test_type_mismatch_surfaces() {
        let world = world();
        let ctx =
            SystemContext::acquire(&world, &access(&[Accessor::read("health")]), 1, 0.0).unwrap();
        assert!(matches!(
            ctx.read::<String>("health"),
            Err(SystemError::TypeMismatch { .. })
        ));
    }
}
