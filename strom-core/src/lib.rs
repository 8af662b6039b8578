//! Strom Core Library
//!
//! This crate provides the foundational types shared between the Strom
//! scheduling engine and its callers.
//!
//! # Overview
//!
//! Strom is a dependency-tracking task scheduler for heterogeneous compute.
//! Callers tag units of work with the variables they read and write; the
//! engine orders conflicting accesses and runs independent work concurrently
//! across execution contexts.
//!
//! # Key Components
//!
//! - **Types**: Strongly-typed handles (`VarId`, `OprId`) and execution
//!   placement (`DeviceKind`, `ExecContext`, `RunContext`, `FnProperty`)
//! - **Error**: The `StromError` taxonomy and `Result` alias

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod prelude;
pub mod types;
