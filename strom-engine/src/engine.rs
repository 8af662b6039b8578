//! The engine interface and its threaded implementation.
//!
//! [`Engine`] is the minimal capability surface (allocate, register, push,
//! wait); it is object safe so alternative scheduling strategies can hide
//! behind `Arc<dyn Engine>`. [`EngineExt`] layers generic conveniences on
//! top. Process-wide access goes through [`get`]/[`shared`], a lazily
//! initialized singleton configured from the environment.

use crate::callback::{AsyncFn, OnComplete, OprFn, SyncFn};
use crate::config::EngineConfig;
use crate::scheduler::EngineCore;
use std::sync::{Arc, OnceLock};
use strom_core::error::Result;
use strom_core::types::{ExecContext, FnProperty, OprId, RunContext, VarId};

/// A dependency-tracking scheduling engine.
///
/// All methods may be called concurrently from any number of caller
/// threads. Pushing never blocks the caller beyond the enqueue itself; only
/// the wait primitives block.
pub trait Engine: Send + Sync {
    /// Allocate a fresh dependency-tracking variable.
    fn new_variable(&self) -> VarId;

    /// Register a reusable operator.
    ///
    /// `const_vars` are read, `mutable_vars` are written; the sets must be
    /// disjoint and free of duplicates.
    ///
    /// # Errors
    /// Returns `E101` if a variable is declared more than once.
    fn new_operator(
        &self,
        body: OprFn,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<OprId>;

    /// Mark an operator deleted.
    ///
    /// Idempotent. The descriptor is retained until every outstanding
    /// invocation of it has completed, then freed.
    fn delete_operator(&self, opr: OprId);

    /// Push one invocation of a registered operator.
    ///
    /// # Errors
    /// Returns `E103` for an unknown or deleted operator, `E102` if one of
    /// its variables has been reclaimed since registration.
    fn push(&self, opr: OprId, ctx: ExecContext) -> Result<()>;

    /// Push an ad-hoc asynchronous function.
    ///
    /// The body must invoke its [`OnComplete`] handle exactly once, from any
    /// thread, once its effects are visible to dependents.
    ///
    /// # Errors
    /// Returns `E101` for overlapping dependency sets, `E102` for an
    /// unknown variable.
    fn push_async(
        &self,
        body: AsyncFn,
        ctx: ExecContext,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<()>;

    /// Push an ad-hoc synchronous function; its completion callback fires
    /// automatically when the body returns.
    ///
    /// # Errors
    /// Same contract as [`Engine::push_async`].
    fn push_sync(
        &self,
        body: SyncFn,
        ctx: ExecContext,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<()> {
        let body: AsyncFn = Box::new(move |run_ctx, on_complete| {
            body(run_ctx);
            on_complete.complete();
        });
        self.push_async(body, ctx, const_vars, mutable_vars, prop)
    }

    /// Schedule the deletion of a variable.
    ///
    /// Queues as a write-class access, so `disposal` runs only once every
    /// previously submitted access on `var` has drained; the token is then
    /// reclaimed and the handle becomes invalid.
    ///
    /// # Errors
    /// Returns `E102` if the variable is unknown or already reclaimed.
    fn delete_variable(&self, disposal: SyncFn, ctx: ExecContext, var: VarId) -> Result<()>;

    /// Block until every access on `var` submitted before this call has
    /// completed.
    ///
    /// Accesses submitted concurrently with or after the call are not
    /// waited for.
    ///
    /// # Errors
    /// Returns `E102` if the variable is unknown or already reclaimed.
    fn wait_for_var(&self, var: VarId) -> Result<()>;

    /// Block until all activity in the engine has finished.
    fn wait_for_all(&self);
}

/// Generic conveniences over [`Engine`], usable on `dyn Engine` too.
pub trait EngineExt: Engine {
    /// [`Engine::push_sync`] taking an unboxed closure.
    ///
    /// # Errors
    /// Same contract as [`Engine::push_sync`].
    fn push_sync_fn<F>(
        &self,
        body: F,
        ctx: ExecContext,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<()>
    where
        F: FnOnce(RunContext) + Send + 'static,
    {
        self.push_sync(Box::new(body), ctx, const_vars, mutable_vars, prop)
    }

    /// [`Engine::push_async`] taking an unboxed closure.
    ///
    /// # Errors
    /// Same contract as [`Engine::push_async`].
    fn push_async_fn<F>(
        &self,
        body: F,
        ctx: ExecContext,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<()>
    where
        F: FnOnce(RunContext, OnComplete) + Send + 'static,
    {
        self.push_async(Box::new(body), ctx, const_vars, mutable_vars, prop)
    }

    /// [`Engine::new_operator`] taking an unboxed closure.
    ///
    /// # Errors
    /// Same contract as [`Engine::new_operator`].
    fn new_operator_fn<F>(
        &self,
        body: F,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<OprId>
    where
        F: Fn(RunContext, OnComplete) + Send + Sync + 'static,
    {
        self.new_operator(Arc::new(body), const_vars, mutable_vars, prop)
    }

    /// [`Engine::delete_variable`] taking an unboxed closure.
    ///
    /// # Errors
    /// Same contract as [`Engine::delete_variable`].
    fn delete_variable_fn<F>(&self, disposal: F, ctx: ExecContext, var: VarId) -> Result<()>
    where
        F: FnOnce(RunContext) + Send + 'static,
    {
        self.delete_variable(Box::new(disposal), ctx, var)
    }
}

impl<E: Engine + ?Sized> EngineExt for E {}

/// The default engine: per-variable queues, per-context worker pools.
pub struct ThreadedEngine {
    core: Arc<EngineCore>,
}

impl ThreadedEngine {
    /// Create an engine with the given configuration.
    ///
    /// # Errors
    /// Returns `E104` for a zero-sized worker pool.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            core: EngineCore::new(config)?,
        })
    }
}

impl Engine for ThreadedEngine {
    fn new_variable(&self) -> VarId {
        self.core.new_variable()
    }

    fn new_operator(
        &self,
        body: OprFn,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<OprId> {
        self.core.register(body, const_vars, mutable_vars, prop)
    }

    fn delete_operator(&self, opr: OprId) {
        self.core.delete_operator(opr);
    }

    fn push(&self, opr: OprId, ctx: ExecContext) -> Result<()> {
        self.core.push_registered(opr, ctx)
    }

    fn push_async(
        &self,
        body: AsyncFn,
        ctx: ExecContext,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> Result<()> {
        self.core
            .push_adhoc(body, ctx, &const_vars, &mutable_vars, prop)
    }

    fn delete_variable(&self, disposal: SyncFn, ctx: ExecContext, var: VarId) -> Result<()> {
        self.core.delete_variable(disposal, ctx, var)
    }

    fn wait_for_var(&self, var: VarId) -> Result<()> {
        self.core.wait_for_var(var)
    }

    fn wait_for_all(&self) {
        self.core.wait_for_all()
    }
}

/// Get the process-wide engine singleton.
///
/// Lazily initialized from [`EngineConfig::from_env`] on first access; an
/// invalid environment falls back to defaults with a warning. The singleton
/// is never torn down; worker pools join when the last reference drops,
/// which for the singleton is process exit.
pub fn get() -> &'static Arc<dyn Engine> {
    static ENGINE: OnceLock<Arc<dyn Engine>> = OnceLock::new();
    ENGINE.get_or_init(|| {
        let engine = ThreadedEngine::new(EngineConfig::from_env()).unwrap_or_else(|err| {
            tracing::warn!(
                error = %err,
                "invalid engine configuration from environment; falling back to defaults"
            );
            ThreadedEngine::new(EngineConfig::default())
                .expect("default engine configuration is valid")
        });
        Arc::new(engine)
    })
}

/// Get a shared-ownership reference to the engine singleton.
///
/// Use this from another global that must keep the engine alive past its
/// own teardown; most callers should use [`get`].
pub fn shared() -> Arc<dyn Engine> {
    Arc::clone(get())
}
