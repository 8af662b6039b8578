//! Prelude for convenient imports.
//!
//! ```ignore
//! use strom_core::prelude::*;
//! ```

pub use crate::error::{Result, StromError};
pub use crate::types::{DeviceKind, ExecContext, FnProperty, OprId, RunContext, VarId};
