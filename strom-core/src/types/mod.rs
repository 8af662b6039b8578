//! Core types used across Strom.

mod context;
mod ids;

pub use context::{DeviceKind, ExecContext, FnProperty, RunContext};
pub use ids::{OprId, VarId};
