//! Worker dispatch.
//!
//! Ready invocations are routed to a worker pool keyed by their target
//! execution context and queue class: `Normal` and `Async` work shares a
//! compute pool per context, copy work goes to a separate, capacity-bounded
//! transfer pool per context (bounding concurrent transfers protects shared
//! interconnect bandwidth). Pools are created lazily on first dispatch to a
//! key and torn down when the engine drops.

use crate::invocation::Invocation;
use crate::scheduler::EngineCore;
use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use strom_core::types::{DeviceKind, ExecContext, FnProperty, RunContext};

use crate::config::EngineConfig;

/// Which pool class an invocation routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum QueueClass {
    /// General-purpose compute (`Normal` and `Async` properties).
    Compute,
    /// Bounded transfer channels (`CopyToDevice`/`CopyFromDevice`).
    Copy,
}

impl QueueClass {
    fn for_property(prop: FnProperty) -> Self {
        if prop.is_copy() {
            Self::Copy
        } else {
            Self::Compute
        }
    }

    const fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Copy => "copy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    device: DeviceKind,
    index: usize,
    class: QueueClass,
}

impl PoolKey {
    fn for_invocation(inv: &Invocation) -> Self {
        Self {
            device: inv.ctx.device,
            index: inv.ctx.index,
            class: QueueClass::for_property(inv.prop),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", self.device, self.index, self.class.as_str())
    }
}

/// Routes ready invocations to lazily-created worker pools.
pub(crate) struct Dispatcher {
    pools: DashMap<PoolKey, WorkerPool>,
    /// Back-reference to the engine, handed to workers so they can run the
    /// completion path. Weak: pools must not keep the engine alive.
    core: Weak<EngineCore>,
    compute_workers: usize,
    copy_channels: usize,
}

impl Dispatcher {
    pub(crate) fn new(config: &EngineConfig, core: Weak<EngineCore>) -> Self {
        Self {
            pools: DashMap::new(),
            core,
            compute_workers: config.compute_workers,
            copy_channels: config.copy_channels,
        }
    }

    /// Hand a runnable invocation to its pool.
    ///
    /// A send can only fail once the engine is mid-teardown; nothing is
    /// dispatched at that point, so a failure here cannot be localized to
    /// one invocation and is fatal.
    pub(crate) fn dispatch(&self, inv: Arc<Invocation>) {
        let key = PoolKey::for_invocation(&inv);
        let size = match key.class {
            QueueClass::Compute => self.compute_workers,
            QueueClass::Copy => self.copy_channels,
        };
        let pool = self
            .pools
            .entry(key)
            .or_insert_with(|| WorkerPool::spawn(key, size, self.core.clone()));
        tracing::trace!(invocation = inv.id, pool = %key, "dispatching invocation");
        pool.sender
            .send(inv)
            .expect("dispatch run queue disconnected");
    }
}

/// A fixed set of worker threads fed from one channel.
///
/// Dropping the pool disconnects the channel and joins the workers.
struct WorkerPool {
    sender: Sender<Arc<Invocation>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn(key: PoolKey, size: usize, core: Weak<EngineCore>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Arc<Invocation>>();
        let ctx = ExecContext {
            device: key.device,
            index: key.index,
        };
        let handles = (0..size)
            .map(|worker| {
                let receiver = receiver.clone();
                let core = core.clone();
                let run_ctx = RunContext { ctx, worker };
                std::thread::Builder::new()
                    .name(format!("strom-{key}-{worker}"))
                    .spawn(move || worker_loop(receiver, core, run_ctx))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        tracing::debug!(pool = %key, workers = size, "spawned worker pool");
        Self { sender, handles }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Disconnect the run queue so idle workers observe shutdown.
        let (dead, _) = crossbeam_channel::unbounded();
        self.sender = dead;
        let current = std::thread::current().id();
        for handle in self.handles.drain(..) {
            // The pool can be torn down from one of its own workers if that
            // worker holds the last engine reference; joining it would
            // deadlock.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(
    receiver: Receiver<Arc<Invocation>>,
    core: Weak<EngineCore>,
    run_ctx: RunContext,
) {
    while let Ok(inv) = receiver.recv() {
        let Some(core) = core.upgrade() else {
            break;
        };
        core.run(inv, run_ctx);
    }
}
