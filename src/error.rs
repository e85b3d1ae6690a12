//! Invariant violations.
//!
//! Nothing in this crate fails recoverably. Every condition described here is a
//! programming error (or misuse of the `testing` overrides) and ends in
//! [`fatal`].

/// A broken lifetime-guard invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeViolation {
    /// A token was released while the reference count was already zero.
    CountUnderflow {
        /// Resource type whose count underflowed.
        type_name: &'static str,
    },
    /// The resource was read while its cell held no value.
    ReadOfEmptyCell {
        /// Resource type of the empty cell.
        type_name: &'static str,
    },
    /// The per-type registry returned state belonging to another type.
    RegistryTypeMismatch {
        /// Resource type that was looked up.
        type_name: &'static str,
    },
}

impl LifetimeViolation {
    /// Returns the resource type the violation concerns.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Self::CountUnderflow { type_name }
            | Self::ReadOfEmptyCell { type_name }
            | Self::RegistryTypeMismatch { type_name } => type_name,
        }
    }
}

impl core::fmt::Display for LifetimeViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CountUnderflow { type_name } => {
                write!(f, "reference count of `{type_name}` released below zero")
            }
            Self::ReadOfEmptyCell { type_name } => {
                write!(f, "read of `{type_name}` after destruction or before construction")
            }
            Self::RegistryTypeMismatch { type_name } => {
                write!(f, "lifetime registry entry for `{type_name}` has the wrong type")
            }
        }
    }
}

impl std::error::Error for LifetimeViolation {}

/// Reports a violated invariant and never returns.
///
/// Release builds of this crate use `panic = "abort"`, so there the process
/// terminates.
///
/// # Panics
/// Always, with the violation's message.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(violation: LifetimeViolation) -> ! {
    crate::diagnostics::trace_violation!(violation);
    panic!("lifetime guard invariant violated: {violation}");
}
