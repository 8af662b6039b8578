//! Strongly-typed identifiers for Strom entities.
//!
//! Handles are cheap, copyable, identity-comparable tokens. They carry no
//! lifetime: the engine allocates them from monotonically increasing
//! counters, so an id is never reused and a reclaimed handle fails lookup
//! cleanly instead of aliasing a live token.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle for a dependency-tracking variable.
///
/// A variable is an opaque token protecting one mutable resource slot; it
/// carries no payload itself. Handles are allocated by the engine and remain
/// valid until a scheduled deletion completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(u64);

impl VarId {
    /// Create a variable id from a raw value.
    ///
    /// Ids are normally allocated by the engine; constructing one by hand is
    /// only useful for tests and serialization round trips.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var_{}", self.0)
    }
}

impl From<u64> for VarId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Handle for a registered operator.
///
/// An operator binds a function body to its declared variable dependencies
/// so the same descriptor can be pushed repeatedly. The handle stays valid
/// until `delete_operator` has been called *and* the last outstanding
/// invocation has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OprId(u64);

impl OprId {
    /// Create an operator id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "opr_{}", self.0)
    }
}

impl From<u64> for OprId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_stable_prefixes() {
        assert_eq!(VarId::new(5).to_string(), "var_5");
        assert_eq!(OprId::new(12).to_string(), "opr_12");
    }

    #[test]
    fn raw_value_round_trips() {
        let var = VarId::from(42);
        assert_eq!(var.as_u64(), 42);
        assert_eq!(VarId::new(42), var);
        assert_ne!(VarId::new(42).as_u64(), OprId::new(43).as_u64());
    }
}
