//! Error types for accessors and world access.

use thiserror::Error;

/// Errors returned by [`World`](crate::World) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// No resource is stored under this name.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Another live handle prevents the requested access.
    #[error("access conflict on resource: {0}")]
    AccessConflict(String),

    /// The stored value is not of the requested type.
    #[error("resource '{name}' is not a {expected}")]
    TypeMismatch {
        /// The resource name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
    },
}

/// A malformed [`Accessor`](crate::Accessor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessorError {
    /// The resource name is empty.
    #[error("accessor resource name is empty")]
    EmptyName,

    /// The resource name has leading or trailing whitespace.
    #[error("accessor resource name '{0}' has surrounding whitespace")]
    UntrimmedName(String),
}
