//! Per-variable access queues.
//!
//! Each variable tracks the FIFO queue of accesses waiting on it and its
//! current occupancy (a set of concurrent readers or a single exclusive
//! writer). Appends and completions each take only this variable's own lock;
//! there is no global scheduler lock.
//!
//! Grant protocol:
//! - a reader is granted immediately iff no writer is active and nothing is
//!   queued ahead of it; otherwise it queues.
//! - a writer is granted immediately iff the variable is entirely idle;
//!   otherwise it queues.
//! - when a writer completes, either the single next queued writer or the
//!   contiguous front run of queued readers is granted (readers batch).
//! - when the last reader completes, a writer at the queue front is granted.
//!
//! Every queued entry therefore has a writer somewhere ahead of it, and the
//! grant order per variable is exactly submission order.

use crate::invocation::Invocation;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use strom_core::types::VarId;

/// A dependency-tracking variable and its scheduling state.
pub(crate) struct VarInner {
    pub(crate) id: VarId,
    state: Mutex<VarState>,
}

#[derive(Default)]
struct VarState {
    /// Bumped on each write completion.
    version: u64,
    /// Number of currently active readers.
    active_readers: usize,
    /// Whether a writer currently holds the variable.
    active_writer: bool,
    /// Set when a deletion completes. Entries drain-granted at that point
    /// were never recorded as occupants, so all occupancy bookkeeping on a
    /// dead variable is skipped.
    dead: bool,
    /// Accesses waiting behind the current occupants, in submission order.
    queue: VecDeque<QueueEntry>,
}

struct QueueEntry {
    inv: Arc<Invocation>,
    write: bool,
}

impl VarInner {
    pub(crate) fn new(id: VarId) -> Self {
        Self {
            id,
            state: Mutex::new(VarState::default()),
        }
    }

    /// Register a read access. Returns `true` if the access is granted
    /// immediately, `false` if it was queued.
    pub(crate) fn append_read(&self, inv: &Arc<Invocation>) -> bool {
        let mut state = self.state.lock();
        if !state.active_writer && state.queue.is_empty() {
            state.active_readers += 1;
            true
        } else {
            state.queue.push_back(QueueEntry {
                inv: Arc::clone(inv),
                write: false,
            });
            false
        }
    }

    /// Register a write access. Returns `true` if the access is granted
    /// immediately, `false` if it was queued.
    pub(crate) fn append_write(&self, inv: &Arc<Invocation>) -> bool {
        let mut state = self.state.lock();
        if !state.active_writer && state.active_readers == 0 && state.queue.is_empty() {
            state.active_writer = true;
            true
        } else {
            state.queue.push_back(QueueEntry {
                inv: Arc::clone(inv),
                write: true,
            });
            false
        }
    }

    /// Release a completed read access, returning any newly granted waiters.
    ///
    /// A no-op once the variable is dead: accesses released by the deletion
    /// drain were never occupants, so there is nothing to unwind.
    pub(crate) fn complete_read(&self) -> Vec<Arc<Invocation>> {
        let mut state = self.state.lock();
        if state.dead {
            return Vec::new();
        }
        debug_assert!(state.active_readers > 0);
        state.active_readers = state.active_readers.saturating_sub(1);
        if state.active_readers == 0 && state.queue.front().is_some_and(|e| e.write) {
            if let Some(entry) = state.queue.pop_front() {
                state.active_writer = true;
                return vec![entry.inv];
            }
        }
        Vec::new()
    }

    /// Release a completed write access, returning any newly granted
    /// waiters: either the single next writer or a contiguous batch of
    /// readers.
    pub(crate) fn complete_write(&self) -> Vec<Arc<Invocation>> {
        let mut state = self.state.lock();
        if state.dead {
            return Vec::new();
        }
        debug_assert!(state.active_writer);
        state.active_writer = false;
        state.version += 1;
        tracing::trace!(var = %self.id, version = state.version, "write completed");

        let mut granted = Vec::new();
        if state.queue.front().is_some_and(|e| e.write) {
            if let Some(entry) = state.queue.pop_front() {
                state.active_writer = true;
                granted.push(entry.inv);
            }
        } else {
            while state.queue.front().is_some_and(|e| !e.write) {
                if let Some(entry) = state.queue.pop_front() {
                    state.active_readers += 1;
                    granted.push(entry.inv);
                }
            }
        }
        granted
    }

    /// Release a completed deletion (a write-class access) and drain the
    /// queue entirely.
    ///
    /// Anything still queued raced the deletion and is granted against the
    /// reclaimed token so it cannot hang; real work ending up here means
    /// the caller pushed after scheduling deletion, so it is logged.
    pub(crate) fn complete_write_and_drain(&self) -> Vec<Arc<Invocation>> {
        let mut state = self.state.lock();
        debug_assert!(state.active_writer);
        state.active_writer = false;
        state.version += 1;
        // Drain-granted entries are not recorded as occupants; marking the
        // variable dead makes their later completions skip occupancy
        // bookkeeping while still driving the engine-wide counters.
        state.dead = true;
        if !state.queue.is_empty() {
            tracing::warn!(
                var = %self.id,
                pending = state.queue.len(),
                "accesses were queued behind a variable deletion; releasing them against the reclaimed token"
            );
        }
        state.queue.drain(..).map(|entry| entry.inv).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var() -> VarInner {
        VarInner::new(VarId::new(0))
    }

    #[test]
    fn idle_variable_grants_immediately() {
        let v = var();
        assert!(v.append_read(&Invocation::stub(1)));
        assert!(v.append_read(&Invocation::stub(2)));

        let w = var();
        assert!(w.append_write(&Invocation::stub(3)));
    }

    #[test]
    fn writer_queues_behind_readers() {
        let v = var();
        assert!(v.append_read(&Invocation::stub(1)));
        assert!(v.append_read(&Invocation::stub(2)));

        let writer = Invocation::stub(3);
        assert!(!v.append_write(&writer));

        // Not the last reader: nothing granted.
        assert!(v.complete_read().is_empty());
        // Last reader out: the queued writer is granted.
        let granted = v.complete_read();
        assert_eq!(granted.len(), 1);
        assert!(Arc::ptr_eq(&granted[0], &writer));
    }

    #[test]
    fn readers_queue_behind_writer_and_batch_on_completion() {
        let v = var();
        assert!(v.append_write(&Invocation::stub(1)));

        let r1 = Invocation::stub(2);
        let r2 = Invocation::stub(3);
        assert!(!v.append_read(&r1));
        assert!(!v.append_read(&r2));

        let granted = v.complete_write();
        assert_eq!(granted.len(), 2);
        assert!(Arc::ptr_eq(&granted[0], &r1));
        assert!(Arc::ptr_eq(&granted[1], &r2));
    }

    #[test]
    fn writers_are_granted_singly_in_order() {
        let v = var();
        assert!(v.append_write(&Invocation::stub(1)));

        let w2 = Invocation::stub(2);
        let w3 = Invocation::stub(3);
        assert!(!v.append_write(&w2));
        assert!(!v.append_write(&w3));

        let granted = v.complete_write();
        assert_eq!(granted.len(), 1);
        assert!(Arc::ptr_eq(&granted[0], &w2));

        let granted = v.complete_write();
        assert_eq!(granted.len(), 1);
        assert!(Arc::ptr_eq(&granted[0], &w3));

        assert!(v.complete_write().is_empty());
    }

    #[test]
    fn reader_batch_stops_at_next_writer() {
        let v = var();
        assert!(v.append_write(&Invocation::stub(1)));

        let r1 = Invocation::stub(2);
        let w2 = Invocation::stub(3);
        let r2 = Invocation::stub(4);
        assert!(!v.append_read(&r1));
        assert!(!v.append_write(&w2));
        assert!(!v.append_read(&r2));

        // Only the front reader run is granted; r2 stays behind w2.
        let granted = v.complete_write();
        assert_eq!(granted.len(), 1);
        assert!(Arc::ptr_eq(&granted[0], &r1));

        let granted = v.complete_read();
        assert_eq!(granted.len(), 1);
        assert!(Arc::ptr_eq(&granted[0], &w2));
    }

    #[test]
    fn drain_releases_everything_queued() {
        let v = var();
        assert!(v.append_write(&Invocation::stub(1)));

        let r = Invocation::stub(2);
        let w = Invocation::stub(3);
        assert!(!v.append_read(&r));
        assert!(!v.append_write(&w));

        let granted = v.complete_write_and_drain();
        assert_eq!(granted.len(), 2);
        assert!(Arc::ptr_eq(&granted[0], &r));
        assert!(Arc::ptr_eq(&granted[1], &w));
    }

    #[test]
    fn completions_after_drain_are_no_ops() {
        let v = var();
        assert!(v.append_write(&Invocation::stub(1)));
        assert!(!v.append_read(&Invocation::stub(2)));
        assert!(!v.append_write(&Invocation::stub(3)));

        assert_eq!(v.complete_write_and_drain().len(), 2);

        // The drained entries were never occupants; releasing them must not
        // touch (or underflow) the dead variable's occupancy.
        assert!(v.complete_read().is_empty());
        assert!(v.complete_write().is_empty());
    }
}
