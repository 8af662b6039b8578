//! Error types for Strom.
//!
//! This module provides strongly-typed errors with actionable context.
//! All errors include the handle that triggered them to aid debugging.
//!
//! Every variant here is a caller contract violation detectable at the call
//! site. Failures *inside* a pushed function body are the body's own
//! responsibility; the engine contains them per invocation but does not
//! surface them through this type.

use crate::types::{OprId, VarId};
use thiserror::Error;

/// The main error type for Strom operations.
#[derive(Error, Debug)]
pub enum StromError {
    /// A variable was declared more than once across an operation's
    /// dependency sets at registration or push time.
    ///
    /// A variable must appear at most once across the read set and the
    /// write set combined; a duplicate declaration is rejected rather than
    /// silently merged.
    #[error("E101: variable {var} is declared more than once across the read and write sets")]
    OverlappingVarSets {
        /// The variable that was declared twice.
        var: VarId,
    },

    /// An operation referenced a variable that was never allocated or has
    /// already been reclaimed by a scheduled deletion.
    ///
    /// Variable ids are never reused, so a stale handle always fails here
    /// instead of aliasing a newer token.
    #[error("E102: unknown variable {var} (never allocated or already reclaimed)")]
    UnknownVariable {
        /// The offending variable handle.
        var: VarId,
    },

    /// A push referenced an operator that was never registered or has
    /// already been deleted.
    #[error("E103: unknown operator {opr} (never registered or already deleted)")]
    UnknownOperator {
        /// The offending operator handle.
        opr: OprId,
    },

    /// The engine configuration requests a zero-sized worker pool.
    #[error("E104: worker pool size for `{what}` must be at least 1")]
    WorkerPoolSize {
        /// The configuration field that was zero.
        what: String,
    },
}

/// A specialized `Result` type for Strom operations.
pub type Result<T> = std::result::Result<T, StromError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_stable_codes() {
        let err = StromError::OverlappingVarSets { var: VarId::new(7) };
        assert!(err.to_string().starts_with("E101"));

        let err = StromError::UnknownVariable { var: VarId::new(3) };
        assert!(err.to_string().contains("var_3"));

        let err = StromError::WorkerPoolSize {
            what: "copy_channels".to_string(),
        };
        assert!(err.to_string().contains("copy_channels"));
    }
}
