use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::component::reference::Reference;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_WORKER: WorkerId = WorkerId::next();
}

/// Identity of a worker running engine operations.
///
/// Both lock tiers are re-entrant per worker, so every call made on behalf of
/// one build call tree must carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Id bound to the calling OS thread
    pub fn current() -> Self {
        CURRENT_WORKER.with(|id| *id)
    }

    /// A fresh id not bound to any thread
    pub fn next() -> Self {
        WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// State of one build call tree, passed explicitly down the build path.
///
/// Tracks how deep the worker is inside nested `build_component` calls and
/// collects binds deferred by the cycle breaker; the outermost call drains
/// them. A context belongs to a single worker and is deliberately `!Sync`.
pub struct BuildContext {
    worker: WorkerId,
    depth: Cell<usize>,
    deferred: RefCell<Vec<Reference>>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildContext {
    /// Context for the calling thread
    pub fn new() -> Self {
        Self::for_worker(WorkerId::current())
    }

    pub fn for_worker(worker: WorkerId) -> Self {
        Self {
            worker,
            depth: Cell::new(0),
            deferred: RefCell::new(Vec::new()),
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Number of `build_component` calls currently open in this call tree
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub(crate) fn enter(&self) -> usize {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        depth
    }

    pub(crate) fn exit(&self) -> usize {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        depth
    }

    pub(crate) fn defer_bind(&self, reference: Reference) {
        self.deferred.borrow_mut().push(reference);
    }

    pub(crate) fn take_deferred(&self) -> Vec<Reference> {
        std::mem::take(&mut *self.deferred.borrow_mut())
    }

    /// Binds deferred so far and not yet handed to the work queue
    pub fn deferred_len(&self) -> usize {
        self.deferred.borrow().len()
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("worker", &self.worker)
            .field("depth", &self.depth.get())
            .field("deferred", &self.deferred.borrow().len())
            .finish()
    }
}
