//! Completion callback handed to asynchronous work.

use crate::invocation::Invocation;
use crate::scheduler::EngineCore;
use std::fmt;
use std::sync::Arc;
use strom_core::types::RunContext;

/// A synchronous function body: its effects are visible when it returns.
pub type SyncFn = Box<dyn FnOnce(RunContext) + Send + 'static>;

/// An asynchronous function body: it must invoke the [`OnComplete`] handle
/// exactly once, possibly from another thread, once its effects are visible.
pub type AsyncFn = Box<dyn FnOnce(RunContext, OnComplete) + Send + 'static>;

/// A reusable operator body, invoked once per push of its operator.
pub type OprFn = Arc<dyn Fn(RunContext, OnComplete) + Send + Sync + 'static>;

/// Handle bound to exactly one invocation, signaling that the invocation's
/// effects are now visible to dependents.
///
/// Carries no payload; any computed result must travel through the pushed
/// function's own side channel. Calling `complete` more than once (via a
/// clone) is a caller error that is detected and rejected with an error log;
/// never calling it for an `Async` invocation leaves the invocation's
/// variables permanently occupied, which surfaces only as a
/// `wait_for_var`/`wait_for_all` that never returns.
#[derive(Clone)]
pub struct OnComplete {
    core: Arc<EngineCore>,
    inv: Arc<Invocation>,
}

impl OnComplete {
    pub(crate) fn new(core: Arc<EngineCore>, inv: Arc<Invocation>) -> Self {
        Self { core, inv }
    }

    /// Signal that the bound invocation has completed.
    ///
    /// Safe to call from any thread, including threads unrelated to the
    /// engine's own pools (e.g. a device driver's notification thread).
    pub fn complete(self) {
        if self.inv.mark_completed() {
            self.core.finish(&self.inv);
        } else {
            tracing::error!(
                invocation = self.inv.id,
                "completion callback invoked more than once; ignoring"
            );
        }
    }
}

impl fmt::Debug for OnComplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnComplete")
            .field("invocation", &self.inv.id)
            .finish()
    }
}
