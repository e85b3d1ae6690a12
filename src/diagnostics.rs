//! Diagnostic events and point-in-time snapshots of per-type lifetime state.
//!
//! Events go through `tracing` when the `tracing` feature is enabled and
//! compile to nothing otherwise.

use serde::{Deserialize, Serialize};

macro_rules! trace_event {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        ::tracing::debug!(target: "lifetime_guard", $($arg)+);
    }};
}

macro_rules! trace_violation {
    ($violation:expr) => {{
        #[cfg(feature = "tracing")]
        ::tracing::error!(
            target: "lifetime_guard",
            type_name = $violation.type_name(),
            "{}",
            $violation
        );
        #[cfg(not(feature = "tracing"))]
        let _ = &$violation;
    }};
}

pub(crate) use trace_event;
pub(crate) use trace_violation;

/// Observable state of one resource type's lifetime facility.
///
/// Taken under the cell lock, so the fields are mutually consistent with
/// respect to construction and destruction. The count itself can move
/// concurrently as tokens come and go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSnapshot {
    /// `core::any::type_name` of the resource.
    pub type_name: String,
    /// Outstanding keep-alive tokens, the anchor included.
    pub count: u64,
    /// Whether a live instance currently exists.
    pub constructed: bool,
    /// Number of construction eras started so far.
    pub generation: u64,
    /// Whether the current era still holds its anchor token.
    pub anchored: bool,
}

impl GuardSnapshot {
    /// Renders the snapshot as a single-line JSON object.
    ///
    /// # Errors
    /// Returns the serializer error if rendering fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a snapshot previously produced by [`GuardSnapshot::to_json`].
    ///
    /// # Errors
    /// Returns the deserializer error for malformed input.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl core::fmt::Display for GuardSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: count={} constructed={} generation={} anchored={}",
            self.type_name, self.count, self.constructed, self.generation, self.anchored
        )
    }
}
