//! World: the shared, name-keyed resource container.
//!
//! The [`World`] maps resource names to type-erased values. Systems never
//! hold a `&World` while they run; instead the scheduler resolves their
//! declared accessors into scoped handles ([`ResourceRef`], [`ResourceMut`])
//! that own their lock and release it when dropped.
//!
//! Each resource sits behind its own `RwLock`. Acquisition never blocks: if
//! the lock is held in an incompatible mode the call fails with
//! [`WorldError::AccessConflict`]. Under a correct execution plan that never
//! happens, so the lock is only a cheap guard against scheduler bugs.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RawRwLock;
use parking_lot::RwLock;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use tracing::trace;

use crate::error::WorldError;

/// A type-erased resource value.
type Value = Box<dyn Any + Send + Sync>;

/// The lock-protected storage for one resource.
type Slot = Arc<RwLock<Value>>;

/// The shared resource container.
///
/// `World` is a handle: cloning it is cheap and every clone sees the same
/// resources. This lets worker tasks own a `World` while the host keeps
/// inserting or inspecting resources between ticks.
#[derive(Clone, Default)]
pub struct World {
    resources: Arc<DashMap<String, Slot>>,
}

impl World {
    /// Create a new empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a resource.
    ///
    /// Returns `true` if a resource with this name already existed. Live
    /// handles to a replaced resource keep seeing the old value.
    pub fn insert<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> bool {
        self.insert_boxed(name, Box::new(value))
    }

    /// Insert (or replace) an already boxed resource.
    pub fn insert_boxed(&self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        trace!(resource = %name, "inserting resource");
        self.resources
            .insert(name, Arc::new(RwLock::new(value)))
            .is_some()
    }

    /// Remove a resource. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.resources.remove(name).is_some()
    }

    /// Returns `true` if a resource with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if the world holds no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All resource names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Acquire a shared read handle.
    ///
    /// # Errors
    ///
    /// - [`WorldError::UnknownResource`] if no resource has this name.
    /// - [`WorldError::AccessConflict`] if a write handle is live.
    pub fn get(&self, name: &str) -> Result<ResourceRef, WorldError> {
        let slot = self.slot(name)?;
        let guard = slot
            .try_read_arc()
            .ok_or_else(|| WorldError::AccessConflict(name.to_string()))?;
        Ok(ResourceRef {
            name: name.to_string(),
            guard,
        })
    }

    /// Acquire an exclusive write handle.
    ///
    /// # Errors
    ///
    /// - [`WorldError::UnknownResource`] if no resource has this name.
    /// - [`WorldError::AccessConflict`] if any other handle is live.
    pub fn get_mut(&self, name: &str) -> Result<ResourceMut, WorldError> {
        let slot = self.slot(name)?;
        let guard = slot
            .try_write_arc()
            .ok_or_else(|| WorldError::AccessConflict(name.to_string()))?;
        Ok(ResourceMut {
            name: name.to_string(),
            guard,
        })
    }

    /// Look up a slot and release the map shard before locking it.
    fn slot(&self, name: &str) -> Result<Slot, WorldError> {
        self.resources
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| WorldError::UnknownResource(name.to_string()))
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("resources", &self.names())
            .finish()
    }
}

/// A scoped shared handle to one resource. Released on drop.
pub struct ResourceRef {
    name: String,
    guard: ArcRwLockReadGuard<RawRwLock, Value>,
}

impl ResourceRef {
    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the stored value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        (**self.guard).is::<T>()
    }

    /// Borrow the stored value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TypeMismatch`] if the value is not a `T`.
    pub fn downcast<T: Any>(&self) -> Result<&T, WorldError> {
        (**self.guard)
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(&self.name))
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef").field("name", &self.name).finish()
    }
}

/// A scoped exclusive handle to one resource. Released on drop.
pub struct ResourceMut {
    name: String,
    guard: ArcRwLockWriteGuard<RawRwLock, Value>,
}

impl ResourceMut {
    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the stored value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        (**self.guard).is::<T>()
    }

    /// Borrow the stored value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TypeMismatch`] if the value is not a `T`.
    pub fn downcast<T: Any>(&self) -> Result<&T, WorldError> {
        (**self.guard)
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(&self.name))
    }

    /// Mutably borrow the stored value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TypeMismatch`] if the value is not a `T`.
    pub fn downcast_mut<T: Any>(&mut self) -> Result<&mut T, WorldError> {
        let name = &self.name;
        (**self.guard)
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(name))
    }
}

impl fmt::Debug for ResourceMut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMut").field("name", &self.name).finish()
    }
}

fn mismatch<T>(name: &str) -> WorldError {
    WorldError::TypeMismatch {
        name: name.to_string(),
        expected: type_name::<T>(),
    }
}
