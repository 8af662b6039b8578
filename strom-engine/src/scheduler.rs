//! The dependency scheduler core.
//!
//! `EngineCore` owns the variable table, the operator registry, the
//! dispatcher, and the global outstanding-invocation counter. Every push
//! registers the new invocation against each of its variables; a variable
//! decrements the invocation's wait count exactly once when it grants
//! access (immediately, or later from a completion), and the invocation is
//! dispatched when the count reaches zero. The count starts at one so an
//! invocation cannot dispatch in the middle of its own registration.
//!
//! Completion releases each held variable, granting newly unblocked
//! waiters, and drives the global counter for `wait_for_all`.

use crate::callback::{AsyncFn, OnComplete, OprFn, SyncFn};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::invocation::Invocation;
use crate::operator::{check_dependency_sets, OperatorRegistry, OprInner};
use crate::var::VarInner;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strom_core::error::{Result, StromError};
use strom_core::types::{ExecContext, FnProperty, OprId, RunContext, VarId};
use tracing::{debug, error, instrument, trace};

/// Shared engine state.
pub(crate) struct EngineCore {
    /// Live variables.
    vars: DashMap<VarId, Arc<VarInner>>,
    next_var: AtomicU64,
    next_inv: AtomicU64,
    /// Registered operators.
    registry: OperatorRegistry,
    /// Worker pools.
    dispatcher: Dispatcher,
    /// Invocations pushed but not yet completed, engine-wide.
    outstanding: Mutex<u64>,
    /// Signaled whenever `outstanding` reaches zero.
    all_done: Condvar,
}

impl EngineCore {
    pub(crate) fn new(config: EngineConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new_cyclic(|weak| Self {
            vars: DashMap::new(),
            next_var: AtomicU64::new(0),
            next_inv: AtomicU64::new(0),
            registry: OperatorRegistry::new(),
            dispatcher: Dispatcher::new(&config, weak.clone()),
            outstanding: Mutex::new(0),
            all_done: Condvar::new(),
        }))
    }

    // ---------------------------------------------------------------------
    // Variable table
    // ---------------------------------------------------------------------

    pub(crate) fn new_variable(&self) -> VarId {
        let id = VarId::new(self.next_var.fetch_add(1, Ordering::Relaxed));
        self.vars.insert(id, Arc::new(VarInner::new(id)));
        debug!(var = %id, "allocated variable");
        id
    }

    fn resolve_var(&self, id: VarId) -> Result<Arc<VarInner>> {
        self.vars
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StromError::UnknownVariable { var: id })
    }

    fn resolve_vars(&self, ids: &[VarId]) -> Result<Vec<Arc<VarInner>>> {
        ids.iter().map(|id| self.resolve_var(*id)).collect()
    }

    // ---------------------------------------------------------------------
    // Operator registry
    // ---------------------------------------------------------------------

    pub(crate) fn register(
        &self,
        body: OprFn,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<OprId> {
        check_dependency_sets(&const_vars, &mutable_vars)?;
        let id = self.registry.register(body, const_vars, mutable_vars, prop);
        debug!(opr = %id, ?prop, "registered operator");
        Ok(id)
    }

    pub(crate) fn delete_operator(&self, opr: OprId) {
        self.registry.mark_deleted(opr);
    }

    // ---------------------------------------------------------------------
    // Push paths
    // ---------------------------------------------------------------------

    #[instrument(skip_all, fields(opr = %opr, ctx = %ctx))]
    pub(crate) fn push_registered(&self, opr: OprId, ctx: ExecContext) -> Result<()> {
        let Some(desc) = self.registry.get(opr) else {
            return Err(StromError::UnknownOperator { opr });
        };
        let const_vars = self.resolve_vars(&desc.const_vars)?;
        let mutable_vars = self.resolve_vars(&desc.mutable_vars)?;
        desc.begin_invocation();

        let body = Arc::clone(&desc.body);
        let body: AsyncFn = Box::new(move |run_ctx, on_complete| body(run_ctx, on_complete));
        let prop = desc.prop;
        let inv = self.make_invocation(body, ctx, const_vars, mutable_vars, prop, Some(desc), false);
        self.submit(inv);
        Ok(())
    }

    #[instrument(skip_all, fields(ctx = %ctx, prop = ?prop))]
    pub(crate) fn push_adhoc(
        &self,
        body: AsyncFn,
        ctx: ExecContext,
        const_vars: &[VarId],
        mutable_vars: &[VarId],
        prop: FnProperty,
    ) -> Result<()> {
        check_dependency_sets(const_vars, mutable_vars)?;
        let const_vars = self.resolve_vars(const_vars)?;
        let mutable_vars = self.resolve_vars(mutable_vars)?;
        let inv = self.make_invocation(body, ctx, const_vars, mutable_vars, prop, None, false);
        self.submit(inv);
        Ok(())
    }

    #[instrument(skip_all, fields(var = %var, ctx = %ctx))]
    pub(crate) fn delete_variable(
        &self,
        disposal: SyncFn,
        ctx: ExecContext,
        var: VarId,
    ) -> Result<()> {
        let target = self.resolve_var(var)?;
        let body: AsyncFn = Box::new(move |run_ctx, on_complete| {
            disposal(run_ctx);
            on_complete.complete();
        });
        let inv = self.make_invocation(
            body,
            ctx,
            Vec::new(),
            vec![target],
            FnProperty::Normal,
            None,
            true,
        );
        debug!(var = %var, "scheduled variable deletion");
        self.submit(inv);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn make_invocation(
        &self,
        body: AsyncFn,
        ctx: ExecContext,
        const_vars: Vec<Arc<VarInner>>,
        mutable_vars: Vec<Arc<VarInner>>,
        prop: FnProperty,
        opr: Option<Arc<OprInner>>,
        deletes_var: bool,
    ) -> Arc<Invocation> {
        let id = self.next_inv.fetch_add(1, Ordering::Relaxed);
        Invocation::new(id, body, const_vars, mutable_vars, prop, ctx, opr, deletes_var)
    }

    /// Register an invocation against all of its variables and drop the
    /// registration guard; if everything granted immediately this dispatches
    /// inline.
    ///
    /// The wait count is raised *before* each append so a grant arriving
    /// from a concurrent completion can never drive it to zero while
    /// registration is still in progress.
    fn submit(&self, inv: Arc<Invocation>) {
        {
            let mut outstanding = self.outstanding.lock();
            *outstanding += 1;
        }
        trace!(invocation = inv.id, prop = ?inv.prop, "pushed invocation");

        for var in &inv.const_vars {
            inv.wait.fetch_add(1, Ordering::AcqRel);
            if var.append_read(&inv) {
                self.grant(&inv);
            }
        }
        for var in &inv.mutable_vars {
            inv.wait.fetch_add(1, Ordering::AcqRel);
            if var.append_write(&inv) {
                self.grant(&inv);
            }
        }
        // Registration guard.
        self.grant(&inv);
    }

    /// One variable (or the registration guard) has granted access.
    fn grant(&self, inv: &Arc<Invocation>) {
        if inv.wait.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.dispatcher.dispatch(Arc::clone(inv));
        }
    }

    // ---------------------------------------------------------------------
    // Execution and completion
    // ---------------------------------------------------------------------

    /// Execute an invocation on a worker thread.
    ///
    /// A panic inside the body is contained per invocation: it is logged and
    /// the completion path still runs so the invocation's variables drain
    /// and unrelated work proceeds.
    pub(crate) fn run(self: &Arc<Self>, inv: Arc<Invocation>, run_ctx: RunContext) {
        let Some(body) = inv.take_body() else {
            error!(invocation = inv.id, "invocation dispatched twice; body already taken");
            return;
        };
        trace!(invocation = inv.id, ctx = %run_ctx.ctx, "executing invocation");

        let on_complete = OnComplete::new(Arc::clone(self), Arc::clone(&inv));
        let outcome = catch_unwind(AssertUnwindSafe(move || body(run_ctx, on_complete)));
        if outcome.is_err() {
            error!(
                invocation = inv.id,
                "pushed function panicked; draining its dependencies"
            );
            if inv.mark_completed() {
                self.finish(&inv);
            }
        }
    }

    /// Completion path: release every variable the invocation held, grant
    /// newly unblocked waiters, and update the global counter.
    ///
    /// Reached exactly once per invocation, gated by its completion flag.
    pub(crate) fn finish(&self, inv: &Arc<Invocation>) {
        for var in &inv.const_vars {
            for granted in var.complete_read() {
                self.grant(&granted);
            }
        }
        for var in &inv.mutable_vars {
            if inv.deletes_var {
                let granted = var.complete_write_and_drain();
                self.vars.remove(&var.id);
                debug!(var = %var.id, "variable reclaimed");
                for waiter in granted {
                    self.grant(&waiter);
                }
            } else {
                for granted in var.complete_write() {
                    self.grant(&granted);
                }
            }
        }

        if let Some(opr) = &inv.opr {
            self.registry.finish_invocation(opr);
        }

        let mut outstanding = self.outstanding.lock();
        *outstanding -= 1;
        trace!(invocation = inv.id, outstanding = *outstanding, "invocation completed");
        if *outstanding == 0 {
            self.all_done.notify_all();
        }
    }

    // ---------------------------------------------------------------------
    // Wait primitives
    // ---------------------------------------------------------------------

    /// Block until every access on `var` submitted before this call has
    /// completed.
    ///
    /// Implemented as a zero-work read-class pseudo-invocation on `var`; it
    /// queues behind everything already submitted (including a scheduled
    /// deletion, which is just another write-class access) and releases the
    /// caller when its own completion fires.
    #[instrument(skip_all, fields(var = %var))]
    pub(crate) fn wait_for_var(&self, var: VarId) -> Result<()> {
        let target = self.resolve_var(var)?;
        let released = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&released);
        let body: AsyncFn = Box::new(move |_run_ctx, on_complete| {
            let (flag, condvar) = &*signal;
            *flag.lock() = true;
            condvar.notify_all();
            on_complete.complete();
        });
        let inv = self.make_invocation(
            body,
            ExecContext::cpu(),
            vec![target],
            Vec::new(),
            FnProperty::Normal,
            None,
            false,
        );
        self.submit(inv);

        let (flag, condvar) = &*released;
        let mut guard = flag.lock();
        while !*guard {
            condvar.wait(&mut guard);
        }
        Ok(())
    }

    /// Block until the engine-wide outstanding-invocation count is zero.
    #[instrument(skip(self))]
    pub(crate) fn wait_for_all(&self) {
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 {
            self.all_done.wait(&mut outstanding);
        }
    }
}
