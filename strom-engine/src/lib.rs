//! Strom Engine - dependency-tracking task scheduler.
//!
//! This crate provides the scheduling engine for Strom:
//! - Variable table tracking per-resource access queues
//! - Operator registry for reusable work descriptors
//! - Dependency scheduler computing readiness on push and completion
//! - Worker dispatch across per-context, per-class thread pools
//! - Completion callbacks decoupling "submitted" from "effects visible"
//! - Deferred deletion of operators and variables
//! - Blocking wait primitives (`wait_for_var`, `wait_for_all`)
//!
//! # Overview
//!
//! Callers push function bodies together with the variables they read
//! (`const_vars`) and mutate (`mutable_vars`). The engine grants each
//! variable's accesses in submission order (many concurrent readers, one
//! exclusive writer) and dispatches an invocation as soon as every one of
//! its variables has granted. Work touching disjoint variables runs
//! concurrently with no ordering implied.
//!
//! # Example
//!
//! ```ignore
//! use strom_core::prelude::*;
//! use strom_engine::{Engine, EngineExt};
//!
//! let engine = strom_engine::shared();
//! let x = engine.new_variable();
//!
//! // A write on x...
//! engine.push_sync_fn(|_rc| { /* fill x's buffer */ },
//!     ExecContext::cpu(), vec![], vec![x], FnProperty::Normal)?;
//!
//! // ...and a read that is guaranteed to see it.
//! engine.push_sync_fn(|_rc| { /* consume x */ },
//!     ExecContext::cpu(), vec![x], vec![], FnProperty::Normal)?;
//!
//! engine.wait_for_var(x)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;

mod callback;
mod dispatch;
mod engine;
mod invocation;
mod operator;
mod scheduler;
mod var;

pub use callback::{AsyncFn, OnComplete, OprFn, SyncFn};
pub use config::EngineConfig;
pub use engine::{get, shared, Engine, EngineExt, ThreadedEngine};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::callback::{AsyncFn, OnComplete, OprFn, SyncFn};
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineExt, ThreadedEngine};
    pub use strom_core::prelude::*;
}
