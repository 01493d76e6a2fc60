//! Accessors: declarative resource access for systems.
//!
//! An [`Accessor`] names one resource and how a system touches it. A system
//! declares a list of accessors; the scheduler folds them into an
//! [`AccessSet`] to detect conflicts between systems and to decide which
//! World handles to acquire before the system runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AccessorError;

/// How a resource is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessMode {
    /// Shared, read-only access.
    Read,
    /// Exclusive, mutable access.
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// A declared access to a single named resource.
///
/// Accessors are plain values: once built they never change. Two accessors
/// conflict when they name the same resource and at least one of them
/// writes it.
///
/// ```rust
/// use star_component::Accessor;
///
/// let read = Accessor::read("health");
/// let write = Accessor::write("health");
/// assert!(read.conflicts_with(&write));
/// assert!(!read.conflicts_with(&Accessor::read("health")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accessor {
    /// Read the named resource.
    Read(String),
    /// Write the named resource.
    Write(String),
}

impl Accessor {
    /// Declare read access to `name`.
    #[must_use]
    pub fn read(name: impl Into<String>) -> Self {
        Self::Read(name.into())
    }

    /// Declare write access to `name`.
    #[must_use]
    pub fn write(name: impl Into<String>) -> Self {
        Self::Write(name.into())
    }

    /// Build an accessor from a name and mode.
    #[must_use]
    pub fn new(name: impl Into<String>, mode: AccessMode) -> Self {
        match mode {
            AccessMode::Read => Self::read(name),
            AccessMode::Write => Self::write(name),
        }
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Read(name) | Self::Write(name) => name,
        }
    }

    /// The access mode.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        match self {
            Self::Read(_) => AccessMode::Read,
            Self::Write(_) => AccessMode::Write,
        }
    }

    /// Returns `true` for write accessors.
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.mode() == AccessMode::Write
    }

    /// Checks whether this accessor conflicts with another: same resource,
    /// at least one side writing.
    #[must_use]
    pub fn conflicts_with(&self, other: &Accessor) -> bool {
        self.name() == other.name() && (self.is_write() || other.is_write())
    }

    /// Check that the resource name is usable as a World key.
    ///
    /// # Errors
    ///
    /// Returns [`AccessorError::EmptyName`] for an empty name and
    /// [`AccessorError::UntrimmedName`] when the name carries leading or
    /// trailing whitespace.
    pub fn validate(&self) -> Result<(), AccessorError> {
        let name = self.name();
        if name.is_empty() {
            return Err(AccessorError::EmptyName);
        }
        if name.trim() != name {
            return Err(AccessorError::UntrimmedName(name.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(name) => write!(f, "Read({name})"),
            Self::Write(name) => write!(f, "Write({name})"),
        }
    }
}

/// The merged accessors of one system.
///
/// Each resource name appears once. If a system declares both `Read(x)` and
/// `Write(x)`, the set records `Write` for `x`, so the system acquires a
/// single exclusive handle and never waits on itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSet {
    modes: BTreeMap<String, AccessMode>,
}

impl AccessSet {
    /// Create an empty access set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a list of accessors into a set.
    #[must_use]
    pub fn from_accessors<'a>(accessors: impl IntoIterator<Item = &'a Accessor>) -> Self {
        let mut set = Self::new();
        for accessor in accessors {
            set.insert(accessor);
        }
        set
    }

    /// Add one accessor. Write access wins over read access.
    pub fn insert(&mut self, accessor: &Accessor) {
        let mode = self
            .modes
            .entry(accessor.name().to_string())
            .or_insert(AccessMode::Read);
        if accessor.is_write() {
            *mode = AccessMode::Write;
        }
    }

    /// The mode recorded for `name`, if the set touches it.
    #[must_use]
    pub fn mode_of(&self, name: &str) -> Option<AccessMode> {
        self.modes.get(name).copied()
    }

    /// Resource names accessed read-only.
    pub fn reads(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, mode)| *mode == AccessMode::Read)
            .map(|(name, _)| name)
    }

    /// Resource names accessed mutably.
    pub fn writes(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, mode)| *mode == AccessMode::Write)
            .map(|(name, _)| name)
    }

    /// All resource names in the set, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// Iterate `(name, mode)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AccessMode)> {
        self.modes.iter().map(|(name, mode)| (name.as_str(), *mode))
    }

    /// Number of distinct resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Returns `true` if the set touches no resource.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Checks whether this set conflicts with another.
    ///
    /// ```text
    /// ∃ name ∈ A ∩ B such that A[name] = Write OR B[name] = Write
    /// ```
    #[must_use]
    pub fn conflicts_with(&self, other: &AccessSet) -> bool {
        self.conflicting_resources(other).next().is_some()
    }

    /// The resource names that make the two sets conflict.
    pub fn conflicting_resources<'a>(
        &'a self,
        other: &'a AccessSet,
    ) -> impl Iterator<Item = &'a str> + 'a {
        // Walk the smaller map and probe the larger one.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().filter_map(move |(name, mode)| {
            let theirs = large.mode_of(name)?;
            (mode == AccessMode::Write || theirs == AccessMode::Write).then_some(name)
        })
    }
}

impl<'a> FromIterator<&'a Accessor> for AccessSet {
    fn from_iter<I: IntoIterator<Item = &'a Accessor>>(iter: I) -> Self {
        Self::from_accessors(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(accessors: &[Accessor]) -> AccessSet {
        AccessSet::from_accessors(accessors)
    }

    #[test]
    fn test_no_conflict_both_read() {
        let a = Accessor::read("transform");
        let b = Accessor::read("transform");
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_conflict_read_vs_write() {
        let a = Accessor::read("transform");
        let b = Accessor::write("transform");
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_conflict_write_vs_write() {
        let a = Accessor::write("velocity");
        let b = Accessor::write("velocity");
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn test_no_conflict_different_names() {
        let a = Accessor::write("velocity");
        let b = Accessor::write("ai_state");
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_new_matches_shorthand() {
        assert_eq!(Accessor::new("x", AccessMode::Read), Accessor::read("x"));
        assert_eq!(Accessor::new("x", AccessMode::Write), Accessor::write("x"));
        assert_eq!(Accessor::write("x").mode(), AccessMode::Write);
        assert_eq!(Accessor::read("x").name(), "x");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert_eq!(Accessor::read("").validate(), Err(AccessorError::EmptyName));
        assert_eq!(
            Accessor::write(" health").validate(),
            Err(AccessorError::UntrimmedName(" health".to_string()))
        );
        assert!(Accessor::read("health").validate().is_ok());
    }

    #[test]
    fn test_access_set_write_dominates_read() {
        let s = set(&[Accessor::read("health"), Accessor::write("health")]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.mode_of("health"), Some(AccessMode::Write));

        // Order of declaration does not matter.
        let s = set(&[Accessor::write("health"), Accessor::read("health")]);
        assert_eq!(s.mode_of("health"), Some(AccessMode::Write));
    }

    #[test]
    fn test_access_set_reads_and_writes() {
        let s = set(&[
            Accessor::read("transform"),
            Accessor::write("velocity"),
            Accessor::read("time"),
        ]);
        assert_eq!(s.reads().collect::<Vec<_>>(), vec!["time", "transform"]);
        assert_eq!(s.writes().collect::<Vec<_>>(), vec!["velocity"]);
    }

    #[test]
    fn test_physics_and_ai_do_not_conflict() {
        // Physics: reads transform, writes velocity.
        // AI: reads transform, writes ai_state.
        let physics = set(&[Accessor::read("transform"), Accessor::write("velocity")]);
        let ai = set(&[Accessor::read("transform"), Accessor::write("ai_state")]);
        assert!(!physics.conflicts_with(&ai));
    }

    #[test]
    fn test_movement_conflicts_with_physics() {
        let physics = set(&[Accessor::read("transform"), Accessor::write("velocity")]);
        let movement = set(&[Accessor::read("velocity"), Accessor::write("transform")]);
        assert!(physics.conflicts_with(&movement));

        let mut names: Vec<_> = physics.conflicting_resources(&movement).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["transform", "velocity"]);
    }

    #[test]
    fn test_self_read_write_only_conflicts_with_others() {
        let healer = set(&[Accessor::read("health"), Accessor::write("health")]);
        let mover = set(&[Accessor::write("position")]);
        let viewer = set(&[Accessor::read("health")]);
        assert!(!healer.conflicts_with(&mover));
        assert!(healer.conflicts_with(&viewer));
    }

    #[test]
    fn test_accessor_deserialises_from_loader_json() {
        let json = r#"[{"Read":"health"},{"Write":"position"}]"#;
        let accessors: Vec<Accessor> = serde_json::from_str(json).unwrap();
        assert_eq!(
            accessors,
            vec![Accessor::read("health"), Accessor::write("position")]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Accessor::read("x").to_string(), "Read(x)");
        assert_eq!(AccessMode::Write.to_string(), "write");
    }
}
