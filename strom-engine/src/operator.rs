//! Operator registry.
//!
//! Registered operators are reusable descriptors: the same handle can be
//! pushed many times, each push an independently tracked invocation.
//! Deletion is deferred; the descriptor outlives `delete_operator` until its
//! last outstanding invocation completes.

use crate::callback::OprFn;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use strom_core::error::{Result, StromError};
use strom_core::types::{FnProperty, OprId, VarId};

/// Immutable operator descriptor plus live invocation bookkeeping.
pub(crate) struct OprInner {
    pub(crate) id: OprId,
    pub(crate) body: OprFn,
    pub(crate) const_vars: Vec<VarId>,
    pub(crate) mutable_vars: Vec<VarId>,
    pub(crate) prop: FnProperty,
    /// Invocations pushed but not yet completed.
    outstanding: AtomicUsize,
    /// Set by `delete_operator`; the descriptor is reclaimed once
    /// `outstanding` drops to zero.
    deleted: AtomicBool,
}

impl OprInner {
    pub(crate) fn begin_invocation(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }
}

/// Table of registered operators.
pub(crate) struct OperatorRegistry {
    oprs: DashMap<OprId, Arc<OprInner>>,
    next: AtomicU64,
}

impl OperatorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            oprs: DashMap::new(),
            next: AtomicU64::new(0),
        }
    }

    /// Store a validated descriptor and hand out its handle.
    ///
    /// Callers are expected to have run [`check_dependency_sets`] first.
    pub(crate) fn register(
        &self,
        body: OprFn,
        const_vars: Vec<VarId>,
        mutable_vars: Vec<VarId>,
        prop: FnProperty,
    ) -> OprId {
        let id = OprId::new(self.next.fetch_add(1, Ordering::Relaxed));
        self.oprs.insert(
            id,
            Arc::new(OprInner {
                id,
                body,
                const_vars,
                mutable_vars,
                prop,
                outstanding: AtomicUsize::new(0),
                deleted: AtomicBool::new(false),
            }),
        );
        id
    }

    /// Look up a live (not yet deleted) operator.
    pub(crate) fn get(&self, id: OprId) -> Option<Arc<OprInner>> {
        self.oprs
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|opr| !opr.deleted.load(Ordering::Acquire))
    }

    /// Mark an operator deleted. Idempotent; unknown handles are ignored.
    ///
    /// The descriptor is removed immediately if nothing is in flight,
    /// otherwise by the completion of its last outstanding invocation.
    pub(crate) fn mark_deleted(&self, id: OprId) {
        let Some(opr) = self.oprs.get(&id).map(|entry| Arc::clone(entry.value())) else {
            tracing::debug!(opr = %id, "delete of unknown operator ignored");
            return;
        };
        opr.deleted.store(true, Ordering::Release);
        let outstanding = opr.outstanding.load(Ordering::Acquire);
        if outstanding == 0 {
            self.oprs.remove(&id);
            tracing::debug!(opr = %id, "operator reclaimed");
        } else {
            tracing::debug!(opr = %id, outstanding, "operator deletion deferred");
        }
    }

    /// Record the completion of one invocation of `opr`, reclaiming the
    /// descriptor if it was the last one and deletion is pending.
    pub(crate) fn finish_invocation(&self, opr: &Arc<OprInner>) {
        if opr.outstanding.fetch_sub(1, Ordering::AcqRel) == 1
            && opr.deleted.load(Ordering::Acquire)
        {
            self.oprs.remove(&opr.id);
            tracing::debug!(opr = %opr.id, "operator reclaimed after last invocation");
        }
    }
}

/// Validate an operation's dependency declaration: a variable may appear at
/// most once across the read and write sets combined.
pub(crate) fn check_dependency_sets(const_vars: &[VarId], mutable_vars: &[VarId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(const_vars.len() + mutable_vars.len());
    for var in const_vars.iter().chain(mutable_vars.iter()) {
        if !seen.insert(*var) {
            return Err(StromError::OverlappingVarSets { var: *var });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_body() -> OprFn {
        Arc::new(|_rc, on_complete| on_complete.complete())
    }

    #[test]
    fn overlapping_sets_are_rejected() {
        let a = VarId::new(1);
        let b = VarId::new(2);

        assert!(check_dependency_sets(&[a], &[b]).is_ok());

        let err = check_dependency_sets(&[a, b], &[b]).unwrap_err();
        assert!(matches!(err, StromError::OverlappingVarSets { var } if var == b));

        // Duplicates within one set are rejected too.
        let err = check_dependency_sets(&[], &[a, a]).unwrap_err();
        assert!(matches!(err, StromError::OverlappingVarSets { var } if var == a));
    }

    #[test]
    fn deletion_with_nothing_in_flight_is_immediate() {
        let registry = OperatorRegistry::new();
        let id = registry.register(noop_body(), vec![], vec![], FnProperty::Normal);
        assert!(registry.get(id).is_some());

        registry.mark_deleted(id);
        assert!(registry.get(id).is_none());

        // Idempotent.
        registry.mark_deleted(id);
    }

    #[test]
    fn deletion_defers_until_last_invocation_finishes() {
        let registry = OperatorRegistry::new();
        let id = registry.register(noop_body(), vec![], vec![], FnProperty::Normal);

        let opr = registry.get(id).expect("operator should be live");
        opr.begin_invocation();
        opr.begin_invocation();

        registry.mark_deleted(id);
        // Deleted operators are invisible to new pushes...
        assert!(registry.get(id).is_none());
        // ...but the descriptor survives while invocations are in flight.
        assert!(registry.oprs.contains_key(&id));

        registry.finish_invocation(&opr);
        assert!(registry.oprs.contains_key(&id));
        registry.finish_invocation(&opr);
        assert!(!registry.oprs.contains_key(&id));
    }
}
