use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::configuration::ComponentConfiguration;
use crate::component::reference::Reference;
use crate::component::state::DeactivationReason;
use crate::registry::ServiceReference;

/// A service withdrawn from one consumer's dynamic reference
#[derive(Debug, Clone)]
pub struct UnbindEntry {
    pub reference: Reference,
    pub component: Arc<ComponentConfiguration>,
    pub service: ServiceReference,
}

/// Unit of work handed to the external scheduler
#[derive(Clone)]
pub enum WorkItem {
    Build(Vec<Arc<ComponentConfiguration>>),
    Dispose(Vec<Arc<ComponentConfiguration>>, DeactivationReason),
    DynamicBind(Vec<Reference>),
    DynamicUnbind(Vec<UnbindEntry>),
}

impl WorkItem {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::Build(_) => "build",
            WorkItem::Dispose(..) => "dispose",
            WorkItem::DynamicBind(_) => "dynamic-bind",
            WorkItem::DynamicUnbind(_) => "dynamic-unbind",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            WorkItem::Build(batch) | WorkItem::Dispose(batch, _) => batch.len(),
            WorkItem::DynamicBind(references) => references.len(),
            WorkItem::DynamicUnbind(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Build(batch) => f
                .debug_tuple("Build")
                .field(&batch.iter().map(|c| c.name()).collect::<Vec<_>>())
                .finish(),
            WorkItem::Dispose(batch, reason) => f
                .debug_tuple("Dispose")
                .field(&batch.iter().map(|c| c.name()).collect::<Vec<_>>())
                .field(reason)
                .finish(),
            WorkItem::DynamicBind(references) => f.debug_tuple("DynamicBind").field(references).finish(),
            WorkItem::DynamicUnbind(entries) => f.debug_tuple("DynamicUnbind").field(entries).finish(),
        }
    }
}

/// Accepts work for later execution by the scheduler's workers
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, item: WorkItem);
}

/// Work queue that only records what it was given
#[derive(Debug, Default)]
pub struct RecordingWorkQueue {
    items: Mutex<Vec<WorkItem>>,
}

impl RecordingWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Remove and return everything queued so far
    pub fn take(&self) -> Vec<WorkItem> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl WorkQueue for RecordingWorkQueue {
    fn enqueue(&self, item: WorkItem) {
        log::debug!("Queued {} work item with {} entries", item.kind(), item.len());
        self.items.lock().push(item);
    }
}
