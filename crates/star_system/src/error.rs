//! Per-system failure reasons.

use star_component::{AccessMode, WorldError};
use thiserror::Error;

/// Why a system did not complete successfully in a tick.
///
/// Every variant is recovered at the system boundary: the scheduler records
/// it against the system in the tick result and keeps going.
#[derive(Debug, Error)]
pub enum SystemError {
    /// The system declared a resource the World does not have.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// A handle could not be acquired because another live handle held the
    /// resource. Unreachable under a correct execution plan.
    #[error("access conflict on resource: {0}")]
    AccessConflict(String),

    /// The resource holds a different type than the system asked for.
    #[error("resource '{name}' is not a {expected}")]
    TypeMismatch {
        /// The resource name.
        name: String,
        /// The requested type.
        expected: &'static str,
    },

    /// The system touched a resource it did not declare with this mode.
    #[error("{mode} access to '{name}' was not declared")]
    NotGranted {
        /// The resource name.
        name: String,
        /// The access that was attempted.
        mode: AccessMode,
    },

    /// The system's own logic failed.
    #[error("system run failed: {0}")]
    Run(#[source] anyhow::Error),

    /// The system panicked while running.
    #[error("system panicked: {0}")]
    Panicked(String),
}

impl From<WorldError> for SystemError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::UnknownResource(name) => Self::UnknownResource(name),
            WorldError::AccessConflict(name) => Self::AccessConflict(name),
            WorldError::TypeMismatch { name, expected } => Self::TypeMismatch { name, expected },
        }
    }
}

impl From<anyhow::Error> for SystemError {
    fn from(err: anyhow::Error) -> Self {
        // Errors raised through `?` inside a system body keep their original
        // variant when they started life as a `SystemError`.
        match err.downcast::<SystemError>() {
            Ok(inner) => inner,
            Err(err) => Self::Run(err),
        }
    }
}
