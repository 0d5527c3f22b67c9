//! Mutation serialization.
//!
//! Every public mutation entry point of the store runs under one
//! `WriterLock`. Holding the `MutationGuard` is the right to mutate; the
//! guard hands out typed domain tokens that internal helpers demand:
//!
//! ```text
//! MutationGuard ──nodes()──▶ NodeDomain ──edges()──▶ EdgeDomain
//! ```
//!
//! The only way to an `EdgeDomain` is through a `NodeDomain`, and there is
//! no way back, so node state is always entered before edge state within
//! one operation. Readers never take this lock.
//!
//! ```compile_fail
//! use dag_rs::tx::{MutationKind, WriterLock};
//!
//! let lock = WriterLock::new();
//! let guard = lock.lock(MutationKind::Edge);
//! let _edges = guard.edges();
//! ```

use std::marker::PhantomData;

use parking_lot::{Mutex, MutexGuard};

/// Mutation mode, recorded for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Node,
    Edge,
    Property,
    State,
}

/// Single-writer exclusion for a store instance.
#[derive(Debug, Default)]
pub struct WriterLock {
    inner: Mutex<()>,
}

impl WriterLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until this thread is the only writer.
    pub fn lock(&self, kind: MutationKind) -> MutationGuard<'_> {
        let guard = self.inner.lock();
        tracing::trace!(?kind, "writer lock acquired");
        MutationGuard { _guard: guard, kind }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Proof of exclusive write access.
pub struct MutationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    kind: MutationKind,
}

impl<'a> MutationGuard<'a> {
    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    /// Enter the node domain.
    pub fn nodes(&self) -> NodeDomain<'_> {
        NodeDomain { _held: PhantomData }
    }
}

/// Token for node-table mutation.
#[derive(Clone, Copy)]
pub struct NodeDomain<'g> {
    _held: PhantomData<&'g ()>,
}

impl<'g> NodeDomain<'g> {
    /// Descend into the edge domain while still holding node state.
    pub fn edges(&self) -> EdgeDomain<'_> {
        EdgeDomain { _held: PhantomData }
    }
}

/// Token for edge-table mutation.
#[derive(Clone, Copy)]
pub struct EdgeDomain<'g> {
    _held: PhantomData<&'g ()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_guard_excludes_other_writers() {
        let lock = WriterLock::new();
        {
            let guard = lock.lock(MutationKind::Node);
            assert!(lock.is_locked());
            let nodes = guard.nodes();
            let _edges = nodes.edges();
            assert_eq!(guard.kind(), MutationKind::Node);
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_writers_are_serialized() {
        let lock = Arc::new(WriterLock::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _g = lock.lock(MutationKind::Edge);
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
