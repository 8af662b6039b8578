//! Execution placement types.
//!
//! The engine never interprets a context beyond selecting a dispatch queue;
//! device enumeration and identity are owned by the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of device an execution context refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// The host CPU.
    Cpu,
    /// An accelerator device (GPU or similar), identified by index.
    Accel,
}

impl DeviceKind {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Accel => "accel",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Placement descriptor supplied at push time.
///
/// Selects which device's queues run an invocation. Two contexts with the
/// same kind and index route to the same worker pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecContext {
    /// The device kind.
    pub device: DeviceKind,
    /// The device index within its kind.
    pub index: usize,
}

impl ExecContext {
    /// The host CPU context.
    #[must_use]
    pub const fn cpu() -> Self {
        Self {
            device: DeviceKind::Cpu,
            index: 0,
        }
    }

    /// An accelerator context by device index.
    #[must_use]
    pub const fn accel(index: usize) -> Self {
        Self {
            device: DeviceKind::Accel,
            index,
        }
    }
}

impl fmt::Display for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.index)
    }
}

/// Context handed to every function body, describing where it is actually
/// executing.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    /// The execution context the body was routed to.
    pub ctx: ExecContext,
    /// Index of the worker thread inside its pool.
    pub worker: usize,
}

/// Scheduling property of a pushed function.
///
/// Classifies work so dispatch can route it and bound contention: copies
/// share a capacity-bounded transfer queue per context, and `Async` work is
/// launched by a worker but completes later through its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FnProperty {
    /// Ordinary compute, no special resource contention.
    #[default]
    Normal,
    /// Copy from a device to the host or another device.
    CopyFromDevice,
    /// Copy from the host to a device.
    CopyToDevice,
    /// The function returns immediately and signals true completion later
    /// via its callback, possibly from an unrelated thread.
    Async,
}

impl FnProperty {
    /// Whether this property routes to the bounded transfer queue.
    #[must_use]
    pub const fn is_copy(&self) -> bool {
        matches!(self, Self::CopyFromDevice | Self::CopyToDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display() {
        assert_eq!(ExecContext::cpu().to_string(), "cpu:0");
        assert_eq!(ExecContext::accel(2).to_string(), "accel:2");
    }

    #[test]
    fn copy_classification() {
        assert!(FnProperty::CopyToDevice.is_copy());
        assert!(FnProperty::CopyFromDevice.is_copy());
        assert!(!FnProperty::Normal.is_copy());
        assert!(!FnProperty::Async.is_copy());
    }
}
