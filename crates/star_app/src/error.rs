//! Registration errors.

use star_component::AccessorError;
use thiserror::Error;

/// Why a registration call was rejected.
///
/// A rejected call leaves the previously active registration in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A system reported an empty name.
    #[error("system name is empty")]
    EmptySystemName,

    /// Two systems share a name.
    #[error("duplicate system name: {0}")]
    DuplicateSystem(String),

    /// A system declared a malformed accessor.
    #[error("system '{system}' declares an invalid accessor: {source}")]
    InvalidAccessor {
        /// The offending system.
        system: String,
        /// What was wrong with the accessor.
        #[source]
        source: AccessorError,
    },

    /// A system's execution policy is malformed.
    #[error("system '{system}' has an invalid execution policy: {reason}")]
    InvalidPolicy {
        /// The offending system.
        system: String,
        /// What was wrong with the policy.
        reason: &'static str,
    },
}
