//! One scheduled execution of a function body.

use crate::callback::AsyncFn;
use crate::operator::OprInner;
use crate::var::VarInner;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use strom_core::types::{ExecContext, FnProperty};

/// One scheduled execution instance, tracked independently for dependency
/// purposes.
///
/// Created on push, registered against every variable it touches, dispatched
/// when its wait count reaches zero, and destroyed after its completion
/// updates the per-variable bookkeeping.
pub(crate) struct Invocation {
    /// Engine-unique invocation id, used only for logging.
    pub(crate) id: u64,
    /// The one-shot function body; taken exactly once at execution.
    body: Mutex<Option<AsyncFn>>,
    /// Variables read but not mutated.
    pub(crate) const_vars: Vec<Arc<VarInner>>,
    /// Variables mutated (exclusive access).
    pub(crate) mutable_vars: Vec<Arc<VarInner>>,
    /// Scheduling property, used for queue-class routing.
    pub(crate) prop: FnProperty,
    /// Placement requested at push time.
    pub(crate) ctx: ExecContext,
    /// Number of grants still outstanding: one per variable that could not
    /// grant at registration, plus one registration guard. Dispatched when
    /// it reaches zero.
    pub(crate) wait: AtomicUsize,
    /// Set when the completion callback first fires; a second fire is
    /// detected and rejected.
    completed: AtomicBool,
    /// Registered operator this invocation belongs to, for outstanding-count
    /// bookkeeping. `None` for ad-hoc pushes.
    pub(crate) opr: Option<Arc<OprInner>>,
    /// Whether completing this invocation reclaims its (single) mutable
    /// variable.
    pub(crate) deletes_var: bool,
}

impl Invocation {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        body: AsyncFn,
        const_vars: Vec<Arc<VarInner>>,
        mutable_vars: Vec<Arc<VarInner>>,
        prop: FnProperty,
        ctx: ExecContext,
        opr: Option<Arc<OprInner>>,
        deletes_var: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            body: Mutex::new(Some(body)),
            const_vars,
            mutable_vars,
            prop,
            ctx,
            wait: AtomicUsize::new(1),
            completed: AtomicBool::new(false),
            opr,
            deletes_var,
        })
    }

    /// Take the function body for execution. Returns `None` if it was
    /// already taken.
    pub(crate) fn take_body(&self) -> Option<AsyncFn> {
        self.body.lock().take()
    }

    /// Mark the invocation complete. Returns `true` on the first call and
    /// `false` on every subsequent one.
    pub(crate) fn mark_completed(&self) -> bool {
        !self.completed.swap(true, Ordering::AcqRel)
    }

    #[cfg(test)]
    pub(crate) fn stub(id: u64) -> Arc<Self> {
        Self::new(
            id,
            Box::new(|_rc, on_complete| on_complete.complete()),
            Vec::new(),
            Vec::new(),
            FnProperty::Normal,
            ExecContext::cpu(),
            None,
            false,
        )
    }
}
